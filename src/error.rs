//! Error types for corpus building
//!
//! Per-piece failures (`MalformedPiece`, `RejectedByValidityFilter`,
//! `AlignmentMismatch`, `VoiceCountMismatch`) are recovered by the caller and
//! counted. Everything else aborts the run.

use std::path::PathBuf;

use thiserror::Error;

use crate::segment::VoiceIndex;
use crate::tokenizer::Rejection;

/// Result type for corpus building operations
pub type Result<T> = std::result::Result<T, CorpusError>;

#[derive(Error, Debug)]
pub enum CorpusError {
    /// Bad run-level configuration (zero bar count, unknown tokenizer, ...)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Source file could not be decoded as MIDI
    #[error("Malformed piece {path:?}: {reason}")]
    MalformedPiece { path: PathBuf, reason: String },

    /// Source file decoded but failed the admission checks
    #[error("Rejected {path:?}: {reason}")]
    RejectedByValidityFilter { path: PathBuf, reason: Rejection },

    /// Voices of a persisted piece have different segment counts
    #[error("Alignment mismatch in piece '{piece}': segment counts {lengths:?}")]
    AlignmentMismatch {
        piece: String,
        lengths: Vec<(VoiceIndex, usize)>,
    },

    /// Persisted piece does not carry the expected voice set
    #[error("Piece '{piece}' has voices {found:?}, expected {expected}")]
    VoiceCountMismatch {
        piece: String,
        expected: usize,
        found: Vec<VoiceIndex>,
    },

    /// Merge produced no groups at all
    #[error("Empty corpus: {pieces_seen} pieces seen, {pieces_excluded} excluded")]
    EmptyCorpus {
        pieces_seen: usize,
        pieces_excluded: usize,
    },

    /// A piece id was stored twice
    #[error("Piece '{0}' already stored")]
    DuplicatePiece(String),

    /// A worker task panicked or the pool shut down
    #[error("Worker failed: {0}")]
    Worker(String),

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted document could not be encoded or decoded
    #[error("Document error on {path:?}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl CorpusError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures that only affect a single piece
    pub fn is_per_piece(&self) -> bool {
        matches!(
            self,
            Self::MalformedPiece { .. }
                | Self::RejectedByValidityFilter { .. }
                | Self::AlignmentMismatch { .. }
                | Self::VoiceCountMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_piece_classification() {
        let malformed = CorpusError::MalformedPiece {
            path: PathBuf::from("a.mid"),
            reason: "truncated header".to_string(),
        };
        assert!(malformed.is_per_piece());

        let empty = CorpusError::EmptyCorpus {
            pieces_seen: 0,
            pieces_excluded: 0,
        };
        assert!(!empty.is_per_piece());
        assert!(!CorpusError::InvalidConfiguration("x".into()).is_per_piece());
    }

    #[test]
    fn test_error_messages() {
        let err = CorpusError::AlignmentMismatch {
            piece: "abc".to_string(),
            lengths: vec![(0, 2), (1, 4)],
        };
        assert_eq!(
            err.to_string(),
            "Alignment mismatch in piece 'abc': segment counts [(0, 2), (1, 4)]"
        );
    }
}
