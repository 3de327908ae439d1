//! Dataset builder
//!
//! Walks a directory of MIDI files and turns every admitted piece into one
//! stored document:
//!
//! ```text
//! file -> MidiDocument -> ValidityFilter -> Tokenizer -> PieceSplitter -> PieceStore
//! ```
//!
//! Pieces are independent, so they are processed on the blocking thread pool
//! with at most `jobs` in flight. Per-piece failures are counted in the
//! [`BuildReport`]; storage failures abort the build.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::DatasetConfig;
use crate::error::{CorpusError, Result};
use crate::segment::{BarSegmenter, PieceSplitter};
use crate::store::{build_id_source, IdSource, PieceId, PieceStore};
use crate::tokenizer::{build_tokenizer, MidiDocument, Tokenizer, ValidityFilter};

/// What happened to one source file
#[derive(Debug)]
pub enum PieceOutcome {
    /// Written under `id`
    Stored { id: PieceId, segments: usize },
    /// A document with this id already exists
    AlreadyStored { id: PieceId },
    /// Skipped: malformed or rejected by the validity filter
    Skipped(CorpusError),
}

/// Counts for a whole build run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Candidate files found
    pub discovered: usize,
    /// Pieces that passed the validity filter and tokenized cleanly
    pub admitted: usize,
    pub rejected: usize,
    pub malformed: usize,
    /// Documents newly written
    pub stored: usize,
    /// Documents whose id was already present
    pub already_stored: usize,
    /// Segments of voice 0 across every newly stored piece
    pub segments: usize,
}

impl BuildReport {
    fn record(&mut self, path: &Path, outcome: PieceOutcome) {
        match outcome {
            PieceOutcome::Stored { id, segments } => {
                tracing::debug!("{:?} -> {} ({} segments)", path, id, segments);
                self.admitted += 1;
                self.stored += 1;
                self.segments += segments;
            }
            PieceOutcome::AlreadyStored { id } => {
                tracing::info!("{:?} already stored as {}", path, id);
                self.admitted += 1;
                self.already_stored += 1;
            }
            PieceOutcome::Skipped(err @ CorpusError::RejectedByValidityFilter { .. }) => {
                tracing::debug!("{}", err);
                self.rejected += 1;
            }
            PieceOutcome::Skipped(err) => {
                tracing::warn!("Skipping piece: {}", err);
                self.malformed += 1;
            }
        }
    }
}

/// Per-piece pipeline, shared by every worker
#[derive(Clone)]
struct PieceProcessor {
    filter: ValidityFilter,
    tokenizer: Arc<dyn Tokenizer>,
    splitter: PieceSplitter,
    store: Arc<dyn PieceStore>,
    ids: Arc<dyn IdSource>,
}

impl PieceProcessor {
    fn admit(&self, path: &Path) -> Result<MidiDocument> {
        let doc = MidiDocument::load(path)?;
        self.filter
            .check(&doc)
            .map_err(|reason| CorpusError::RejectedByValidityFilter {
                path: path.to_path_buf(),
                reason,
            })?;
        Ok(doc)
    }

    fn process(&self, path: &Path) -> Result<PieceOutcome> {
        let doc = match self.admit(path) {
            Ok(doc) => doc,
            Err(err) if err.is_per_piece() => return Ok(PieceOutcome::Skipped(err)),
            Err(err) => return Err(err),
        };

        let streams = match self.tokenizer.encode(&doc) {
            Ok(streams) => streams,
            Err(err) => {
                return Ok(PieceOutcome::Skipped(CorpusError::MalformedPiece {
                    path: path.to_path_buf(),
                    reason: err.to_string(),
                }))
            }
        };

        let piece = self.splitter.split(&streams);
        let id = self.ids.next_id(path, &piece);
        match self.store.store(&id, &piece) {
            Ok(()) => Ok(PieceOutcome::Stored {
                id,
                segments: piece.segment_count(),
            }),
            // Same id means same source and tokens only for content-derived ids
            Err(CorpusError::DuplicatePiece(id)) if self.ids.is_content_derived() => {
                Ok(PieceOutcome::AlreadyStored { id })
            }
            Err(err) => Err(err),
        }
    }
}

/// Builds a stored dataset from a directory of MIDI files
pub struct DatasetBuilder {
    processor: PieceProcessor,
    extensions: Vec<String>,
    jobs: usize,
}

impl DatasetBuilder {
    /// Validate `config` and wire up the pipeline against `store`
    ///
    /// Fails with `InvalidConfiguration` before any file is touched.
    pub fn new(config: &DatasetConfig, store: Arc<dyn PieceStore>) -> Result<Self> {
        config.validate()?;

        let segmenter = BarSegmenter::new(config.segmenter.bars_per_segment, config.segmenter.bar_token)?;
        let tokenizer: Arc<dyn Tokenizer> = Arc::from(build_tokenizer(&config.tokenizer)?);
        if tokenizer.bar_token() != segmenter.marker() {
            tracing::warn!(
                "Tokenizer '{}' marks bars with {}, segmenter splits on {}",
                tokenizer.name(),
                tokenizer.bar_token(),
                segmenter.marker()
            );
        }

        Ok(Self {
            processor: PieceProcessor {
                filter: config.filter,
                tokenizer,
                splitter: PieceSplitter::new(segmenter),
                store,
                ids: Arc::from(build_id_source(config.naming)),
            },
            extensions: config.extensions.clone(),
            jobs: config.jobs,
        })
    }

    /// Replace the configured id source
    pub fn with_id_source(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.processor.ids = ids;
        self
    }

    /// Candidate MIDI files under `source`, sorted by path
    pub fn discover(&self, source: &Path) -> Result<Vec<PathBuf>> {
        let walker = WalkBuilder::new(source)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .build();

        let mut paths = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| {
                let io = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "directory walk failed"));
                CorpusError::io(source, io)
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
                paths.push(path.to_path_buf());
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Run the pipeline on a single file
    ///
    /// Unlike [`DatasetBuilder::build`], this does not first advance the id
    /// source past the ids already in the store.
    pub fn process_piece(&self, path: &Path) -> Result<PieceOutcome> {
        self.processor.process(path)
    }

    /// Admission decision for a single file, without storing anything
    pub fn check_piece(&self, path: &Path) -> Result<MidiDocument> {
        self.processor.admit(path)
    }

    /// Process every MIDI file under `source`
    pub async fn build(&self, source: &Path) -> Result<BuildReport> {
        let paths = self.discover(source)?;
        let mut report = BuildReport {
            discovered: paths.len(),
            ..BuildReport::default()
        };
        tracing::info!(
            "Found {} MIDI files under {:?}, splitting into {}-bar segments",
            paths.len(),
            source,
            self.processor.splitter.segmenter().bars_per_segment()
        );

        let existing = self.processor.store.ids()?;
        self.processor.ids.resume_after(&existing);

        let permits = Arc::new(Semaphore::new(self.jobs));
        let mut workers = JoinSet::new();

        for path in paths {
            let permit = permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| CorpusError::Worker(e.to_string()))?;
            let processor = self.processor.clone();
            workers.spawn_blocking(move || {
                let _permit = permit;
                let outcome = processor.process(&path);
                (path, outcome)
            });
        }

        while let Some(joined) = workers.join_next().await {
            let (path, outcome) = joined.map_err(|e| CorpusError::Worker(e.to_string()))?;
            report.record(&path, outcome?);
        }

        tracing::info!(
            "Stored {} pieces ({} segments); {} rejected, {} malformed, {} already stored",
            report.stored,
            report.segments,
            report.rejected,
            report.malformed,
            report.already_stored
        );
        Ok(report)
    }
}
