//! Corpus merger
//!
//! Flattens every stored piece into one corpus of aligned voice groups.
//!
//! ## Alignment Rule
//!
//! A piece contributes only if all considered voices have the same number of
//! segments; otherwise the whole piece is dropped. Group `i` of a piece holds
//! segment `i` of voice 0, voice 1, ... in voice order.
//!
//! ## Voice Policy
//!
//! - `Strict`: the piece must have exactly voices `0..voices`
//! - `Leading`: voices `0..voices` must exist; any others are ignored and
//!   counted in `extra_voices_ignored`

use serde::{Deserialize, Serialize};

use crate::error::{CorpusError, Result};
use crate::segment::{Segment, VoiceIndex};
use crate::store::StoredPiece;

/// How pieces with more voices than configured are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoicePolicy {
    /// Exclude pieces whose voice set differs from `0..voices`
    #[default]
    Strict,
    /// Use the first `voices` voices and ignore the rest
    Leading,
}

impl VoicePolicy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Leading => "leading",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Voices per aligned group
    pub voices: usize,

    pub policy: VoicePolicy,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            voices: 2,
            policy: VoicePolicy::Strict,
        }
    }
}

impl MergeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.voices < 2 || self.voices > usize::from(VoiceIndex::MAX) + 1 {
            return Err(CorpusError::InvalidConfiguration(format!(
                "merge needs between 2 and 256 voices, got {}",
                self.voices
            )));
        }
        Ok(())
    }
}

/// One segment per voice, in voice order, from the same bar window
pub type AlignedGroup = Vec<Segment>;

/// Flat training corpus
///
/// Serializes as `[[[voice 0 tokens], [voice 1 tokens]], ...]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Corpus {
    pub groups: Vec<AlignedGroup>,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlignedGroup> {
        self.groups.iter()
    }

    /// Token count of the longest segment in any group
    ///
    /// An empty corpus has no maximum and yields `EmptyCorpus`.
    pub fn max_segment_len(&self) -> Result<usize> {
        self.groups
            .iter()
            .flatten()
            .map(Vec::len)
            .max()
            .ok_or(CorpusError::EmptyCorpus {
                pieces_seen: 0,
                pieces_excluded: 0,
            })
    }
}

/// Summary of a merge run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Groups in the corpus
    pub pair_count: usize,
    /// Longest segment, in tokens
    pub max_segment_tokens: usize,
    pub pieces_seen: usize,
    pub pieces_included: usize,
    /// Pieces dropped because voice segment counts differ
    pub misaligned: usize,
    /// Pieces dropped because their voice set is wrong
    pub wrong_voice_count: usize,
    /// Included pieces that carried voices beyond the configured count
    pub extra_voices_ignored: usize,
}

impl MergeStats {
    pub fn pieces_excluded(&self) -> usize {
        self.misaligned + self.wrong_voice_count
    }

    /// Two-line human-readable summary
    pub fn summary_lines(&self) -> [String; 2] {
        [
            format!(" {} sequences in the dataset", self.pair_count),
            format!("The longest sequence contains {} tokens", self.max_segment_tokens),
        ]
    }
}

/// Validates and flattens stored pieces
#[derive(Debug, Clone, Copy)]
pub struct CorpusMerger {
    config: MergeConfig,
}

impl CorpusMerger {
    pub fn new(config: MergeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Merge pieces in the given order
    ///
    /// Misaligned pieces and pieces with the wrong voice set are logged,
    /// counted and skipped. A merge that yields no groups fails with
    /// `EmptyCorpus`.
    pub fn merge(&self, pieces: &[StoredPiece]) -> Result<(Corpus, MergeStats)> {
        let mut corpus = Corpus::default();
        let mut stats = MergeStats {
            pieces_seen: pieces.len(),
            ..MergeStats::default()
        };

        for stored in pieces {
            let voices = match self.aligned_voices(stored) {
                Ok(voices) => voices,
                Err(err @ CorpusError::AlignmentMismatch { .. }) => {
                    tracing::warn!("Excluding piece: {}", err);
                    stats.misaligned += 1;
                    continue;
                }
                Err(err @ CorpusError::VoiceCountMismatch { .. }) => {
                    tracing::warn!("Excluding piece: {}", err);
                    stats.wrong_voice_count += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };

            if stored.piece.voice_count() > voices.len() {
                tracing::warn!(
                    "Piece '{}' has {} voices; using the first {}",
                    stored.id,
                    stored.piece.voice_count(),
                    voices.len()
                );
                stats.extra_voices_ignored += 1;
            }

            let windows = voices.first().map_or(0, |v| v.len());
            corpus.groups.extend(
                (0..windows).map(|i| voices.iter().map(|segments| segments[i].clone()).collect::<AlignedGroup>()),
            );
            stats.pieces_included += 1;
        }

        stats.pair_count = corpus.len();
        if corpus.is_empty() {
            return Err(CorpusError::EmptyCorpus {
                pieces_seen: stats.pieces_seen,
                pieces_excluded: stats.pieces_excluded(),
            });
        }
        stats.max_segment_tokens = corpus.max_segment_len()?;

        tracing::info!(
            "Merged {} groups from {}/{} pieces ({} misaligned, {} wrong voice count)",
            stats.pair_count,
            stats.pieces_included,
            stats.pieces_seen,
            stats.misaligned,
            stats.wrong_voice_count
        );

        Ok((corpus, stats))
    }

    /// Segment sequences of voices `0..voices`, checked for alignment
    fn aligned_voices<'a>(&self, stored: &'a StoredPiece) -> Result<Vec<&'a [Segment]>> {
        let piece = &stored.piece;
        let voice_count_mismatch = || CorpusError::VoiceCountMismatch {
            piece: stored.id.clone(),
            expected: self.config.voices,
            found: piece.voice_indices(),
        };

        let voices = (0..self.config.voices)
            .map(|v| VoiceIndex::try_from(v).ok().and_then(|v| piece.voice(v)))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(voice_count_mismatch)?;

        if self.config.policy == VoicePolicy::Strict && piece.voice_count() != self.config.voices {
            return Err(voice_count_mismatch());
        }

        let first = voices[0].len();
        if voices.iter().any(|v| v.len() != first) {
            return Err(CorpusError::AlignmentMismatch {
                piece: stored.id.clone(),
                lengths: voices
                    .iter()
                    .enumerate()
                    .map(|(v, segments)| (v as VoiceIndex, segments.len()))
                    .collect(),
            });
        }

        Ok(voices)
    }
}
