//! MIDI Corpus CLI
//!
//! Builds a training corpus of aligned two-voice token sequences from a
//! directory of MIDI files.
//!
//! ## Quick Start
//!
//! ```bash
//! # Split every admitted piece into 8-bar segments, one JSON file per piece
//! ./midi-corpus split \
//!     --source ./mozart \
//!     --output ./dataset \
//!     --bars 8
//!
//! # Merge all pieces into one corpus
//! ./midi-corpus merge \
//!     --input ./dataset \
//!     --output ./corpus.json
//!
//! # Check which files pass the 4/4 and minimum-length filter
//! ./midi-corpus validate --source ./mozart
//! ```
//!
//! ## Configuration
//!
//! Settings are read from `--config` or `./dataset.toml` when present.
//! Command-line flags override file values. See `config.rs` for the schema.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use midi_corpus_builder::config::DatasetConfig;
use midi_corpus_builder::dataset::{CorpusMerger, DatasetBuilder, VoicePolicy};
use midi_corpus_builder::store::{JsonDirStore, MemoryStore, NamingScheme, PieceStore};
use midi_corpus_builder::tokenizer::TokenizerKind;

/// Tokenizer family for CLI
#[derive(Debug, Clone, Copy, ValueEnum)]
enum TokenizerArg {
    /// Bar / Position / Pitch / Velocity / Duration
    Remi,
    /// NoteOn / NoteOff / TimeShift with bar markers
    MidiLike,
}

impl From<TokenizerArg> for TokenizerKind {
    fn from(arg: TokenizerArg) -> Self {
        match arg {
            TokenizerArg::Remi => TokenizerKind::Remi,
            TokenizerArg::MidiLike => TokenizerKind::MidiLike,
        }
    }
}

/// Document naming for CLI
#[derive(Debug, Clone, Copy, ValueEnum)]
enum NamingArg {
    /// Content hash of source path and tokens
    Hash,
    /// Monotonic counter
    Sequential,
}

impl From<NamingArg> for NamingScheme {
    fn from(arg: NamingArg) -> Self {
        match arg {
            NamingArg::Hash => NamingScheme::Hash,
            NamingArg::Sequential => NamingScheme::Sequential,
        }
    }
}

/// Handling of pieces with extra voices
#[derive(Debug, Clone, Copy, ValueEnum)]
enum VoicePolicyArg {
    /// Exclude pieces whose voice count differs
    Strict,
    /// Use the leading voices, ignore the rest
    Leading,
}

impl From<VoicePolicyArg> for VoicePolicy {
    fn from(arg: VoicePolicyArg) -> Self {
        match arg {
            VoicePolicyArg::Strict => VoicePolicy::Strict,
            VoicePolicyArg::Leading => VoicePolicy::Leading,
        }
    }
}

#[derive(Parser)]
#[command(name = "midi-corpus")]
#[command(about = "Build bar-aligned multi-voice token corpora from MIDI files")]
#[command(version)]
struct Cli {
    /// Path to dataset config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tokenize and split every admitted piece, one JSON document per piece
    Split {
        /// Directory of MIDI files (searched recursively)
        #[arg(short, long)]
        source: PathBuf,

        /// Output directory for per-piece documents
        #[arg(short, long, default_value = "dataset")]
        output: PathBuf,

        /// Segment length in bars
        #[arg(short, long)]
        bars: Option<usize>,

        /// Tokenizer family
        #[arg(short, long, value_enum)]
        tokenizer: Option<TokenizerArg>,

        /// Document naming scheme
        #[arg(long, value_enum)]
        naming: Option<NamingArg>,

        /// Pieces processed concurrently
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Merge stored documents into one aligned corpus
    Merge {
        /// Directory of per-piece documents
        #[arg(short, long, default_value = "dataset")]
        input: PathBuf,

        /// Output file for the corpus (JSON)
        #[arg(short, long, default_value = "corpus.json")]
        output: PathBuf,

        /// Voices per aligned group
        #[arg(long)]
        voices: Option<usize>,

        /// Handling of pieces with a different voice count
        #[arg(long, value_enum)]
        voice_policy: Option<VoicePolicyArg>,
    },

    /// Report which MIDI files pass the admission filter
    Validate {
        /// Directory of MIDI files
        #[arg(short, long)]
        source: PathBuf,
    },

    /// Write the effective configuration as TOML
    InitConfig {
        /// Destination file
        #[arg(short, long, default_value = "dataset.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = DatasetConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Split {
            source,
            output,
            bars,
            tokenizer,
            naming,
            jobs,
        } => {
            if let Some(bars) = bars {
                config.segmenter.bars_per_segment = bars;
            }
            if let Some(tokenizer) = tokenizer {
                config.tokenizer.kind = tokenizer.into();
            }
            if let Some(naming) = naming {
                config.naming = naming.into();
            }
            if let Some(jobs) = jobs {
                config.jobs = jobs;
            }
            split_pieces(&config, &source, &output).await?;
        }

        Commands::Merge {
            input,
            output,
            voices,
            voice_policy,
        } => {
            if let Some(voices) = voices {
                config.merge.voices = voices;
            }
            if let Some(policy) = voice_policy {
                config.merge.policy = policy.into();
            }
            merge_pieces(&config, &input, &output)?;
        }

        Commands::Validate { source } => {
            validate_sources(&config, &source)?;
        }

        Commands::InitConfig { output } => {
            config.save(&output)?;
            println!("Wrote configuration to {:?}", output);
        }
    }

    Ok(())
}

/// Split every admitted piece under `source` into documents under `output`
async fn split_pieces(config: &DatasetConfig, source: &Path, output: &Path) -> Result<()> {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║              MIDI CORPUS: SPLIT                              ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    // Configuration errors abort here, before the output directory exists
    config.validate()?;

    let store = JsonDirStore::create(output)
        .with_context(|| format!("Failed to prepare output directory {:?}", output))?;

    eprintln!("  Source:    {:?}", source);
    eprintln!("  Output:    {:?}", store.root());
    eprintln!(
        "  Tokenizer: {} - {}",
        config.tokenizer.kind,
        config.tokenizer.kind.description()
    );
    eprintln!("  Segments:  {} bars", config.segmenter.bars_per_segment);
    eprintln!("  Naming:    {}", config.naming.name());

    let builder = DatasetBuilder::new(config, Arc::new(store))?;
    let report = builder
        .build(source)
        .await
        .with_context(|| format!("Failed to build dataset from {:?}", source))?;

    println!("\n  Files found:     {}", report.discovered);
    println!("  Admitted:        {}", report.admitted);
    println!("  Rejected:        {}", report.rejected);
    println!("  Malformed:       {}", report.malformed);
    println!("  Stored:          {}", report.stored);
    if report.already_stored > 0 {
        println!("  Already stored:  {}", report.already_stored);
    }
    println!("  Segments:        {}", report.segments);

    Ok(())
}

/// Merge every document under `input` and write the corpus to `output`
fn merge_pieces(config: &DatasetConfig, input: &Path, output: &Path) -> Result<()> {
    let merger = CorpusMerger::new(config.merge)?;
    eprintln!(
        "  Voices:    {} ({})",
        merger.config().voices,
        merger.config().policy.name()
    );
    let store = JsonDirStore::open(input)?;
    let pieces = store
        .load_all()
        .with_context(|| format!("Failed to load documents from {:?}", input))?;

    let (corpus, stats) = merger.merge(&pieces)?;

    for line in stats.summary_lines() {
        println!("{}", line);
    }
    if stats.pieces_excluded() > 0 {
        eprintln!(
            "  Excluded {} of {} pieces ({} misaligned, {} wrong voice count)",
            stats.pieces_excluded(),
            stats.pieces_seen,
            stats.misaligned,
            stats.wrong_voice_count
        );
    }
    if stats.extra_voices_ignored > 0 {
        eprintln!("  Ignored extra voices in {} pieces", stats.extra_voices_ignored);
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string(&corpus)?;
    std::fs::write(output, &json).with_context(|| format!("Failed to write corpus to {:?}", output))?;
    eprintln!("  Corpus written to {:?}", output);

    Ok(())
}

/// Print the admission decision for every MIDI file under `source`
fn validate_sources(config: &DatasetConfig, source: &Path) -> Result<()> {
    println!("Validating {:?}...", source);

    let builder = DatasetBuilder::new(config, Arc::new(MemoryStore::new()))?;
    let paths = builder.discover(source)?;

    let mut admitted = 0;
    for path in &paths {
        match builder.check_piece(path) {
            Ok(doc) => {
                admitted += 1;
                println!(
                    "✓ {} ({} voices, {} bars, {} notes)",
                    path.display(),
                    doc.voices.len(),
                    doc.bar_count(),
                    doc.note_count()
                );
            }
            Err(err) if err.is_per_piece() => println!("✗ {}", err),
            Err(err) => return Err(err.into()),
        }
    }

    println!("\n  {} of {} files admitted", admitted, paths.len());
    Ok(())
}
