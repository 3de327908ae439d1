//! Piece identifier sources

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::PieceId;
use crate::segment::SplitPiece;

/// Produces a unique id for each piece about to be stored
pub trait IdSource: Send + Sync {
    fn next_id(&self, source: &Path, piece: &SplitPiece) -> PieceId;

    /// Equal inputs always map to the same id
    ///
    /// Only then does an existing document under a fresh id mean the piece is
    /// already stored.
    fn is_content_derived(&self) -> bool {
        false
    }

    /// Continue past ids that already exist in the target store
    fn resume_after(&self, _existing: &[PieceId]) {}
}

/// How stored documents are named
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingScheme {
    /// Hash of source path and content
    #[default]
    Hash,
    /// Monotonic counter
    Sequential,
}

impl NamingScheme {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::Sequential => "sequential",
        }
    }
}

/// Build the id source for a naming scheme
pub fn build_id_source(scheme: NamingScheme) -> Box<dyn IdSource> {
    match scheme {
        NamingScheme::Hash => Box::new(ContentHashIds),
        NamingScheme::Sequential => Box::new(SequentialIds::default()),
    }
}

/// SHA-256 over the source path and the segment tokens
///
/// Two distinct source files never share an id unless the hash collides.
/// Re-running over the same file gives the same id.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHashIds;

impl IdSource for ContentHashIds {
    fn next_id(&self, source: &Path, piece: &SplitPiece) -> PieceId {
        let mut hasher = Sha256::new();
        hasher.update(source.to_string_lossy().as_bytes());
        for (voice, segments) in &piece.voices {
            hasher.update([*voice]);
            for segment in segments {
                hasher.update((segment.len() as u64).to_le_bytes());
                for token in segment {
                    hasher.update(token.to_le_bytes());
                }
            }
        }
        format!("{:x}", hasher.finalize())[..16].to_string()
    }

    fn is_content_derived(&self) -> bool {
        true
    }
}

/// Zero-padded counter ids: `000000`, `000001`, ...
///
/// A fresh counter starts at zero; call [`IdSource::resume_after`] with the
/// store's ids before writing into a non-empty store.
#[derive(Debug, Default)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
        }
    }
}

impl IdSource for SequentialIds {
    fn next_id(&self, _source: &Path, _piece: &SplitPiece) -> PieceId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{:06}", self.prefix, n)
    }

    fn resume_after(&self, existing: &[PieceId]) {
        let next = existing
            .iter()
            .filter_map(|id| id.strip_prefix(self.prefix.as_str()))
            .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
            .filter_map(|n| n.parse::<u64>().ok())
            .max()
            .map_or(0, |n| n.saturating_add(1));
        self.next.fetch_max(next, Ordering::Relaxed);
    }
}
