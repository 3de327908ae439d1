//! Dataset assembly
//!
//! ## Modules
//!
//! - `builder` - MIDI directory to stored split pieces
//! - `merger` - stored pieces to one aligned corpus

pub mod builder;
pub mod merger;

pub use builder::{BuildReport, DatasetBuilder, PieceOutcome};
pub use merger::{AlignedGroup, Corpus, CorpusMerger, MergeConfig, MergeStats, VoicePolicy};
