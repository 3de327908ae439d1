//! Persistence of split pieces
//!
//! A [`PieceStore`] keeps one document per split piece and can hand all of
//! them back for merging. Identifiers come from an injected [`IdSource`] so
//! concurrent writers never collide.
//!
//! ## Document Format (JSON)
//!
//! ```json
//! { "0": [[12, 40, 7], [12, 41]], "1": [[30, 2], [31]] }
//! ```
//!
//! Keys are voice indices, values the ordered segments of that voice.

pub mod ids;
pub mod json_dir;
pub mod memory;

use crate::error::Result;
use crate::segment::SplitPiece;

pub use ids::{build_id_source, ContentHashIds, IdSource, NamingScheme, SequentialIds};
pub use json_dir::JsonDirStore;
pub use memory::MemoryStore;

/// Identifier of a stored piece
pub type PieceId = String;

/// A piece as returned by [`PieceStore::load_all`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPiece {
    pub id: PieceId,
    pub piece: SplitPiece,
}

/// Storage backend for split pieces
pub trait PieceStore: Send + Sync {
    /// Persist a piece under a fresh id
    ///
    /// Storing the same id twice is an error; existing documents are never
    /// overwritten.
    fn store(&self, id: &str, piece: &SplitPiece) -> Result<()>;

    /// Every stored piece
    fn load_all(&self) -> Result<Vec<StoredPiece>>;

    /// Ids of every stored piece, without reading the documents
    fn ids(&self) -> Result<Vec<PieceId>>;
}
