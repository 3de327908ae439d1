//! In-memory store

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{PieceId, PieceStore, StoredPiece};
use crate::error::{CorpusError, Result};
use crate::segment::SplitPiece;

/// Keeps pieces in an ordered map; `load_all` returns them by id
#[derive(Debug, Default)]
pub struct MemoryStore {
    pieces: Mutex<BTreeMap<PieceId, SplitPiece>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn pieces(&self) -> MutexGuard<'_, BTreeMap<PieceId, SplitPiece>> {
        self.pieces.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.pieces().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces().is_empty()
    }
}

impl PieceStore for MemoryStore {
    fn store(&self, id: &str, piece: &SplitPiece) -> Result<()> {
        let mut pieces = self.pieces();
        if pieces.contains_key(id) {
            return Err(CorpusError::DuplicatePiece(id.to_string()));
        }
        pieces.insert(id.to_string(), piece.clone());
        Ok(())
    }

    fn ids(&self) -> Result<Vec<PieceId>> {
        Ok(self.pieces().keys().cloned().collect())
    }

    fn load_all(&self) -> Result<Vec<StoredPiece>> {
        Ok(self
            .pieces()
            .iter()
            .map(|(id, piece)| StoredPiece {
                id: id.clone(),
                piece: piece.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_load() {
        let store = MemoryStore::new();
        let mut voices = BTreeMap::new();
        voices.insert(0, vec![vec![4, 5]]);
        let piece = SplitPiece::new(voices);

        store.store("p1", &piece).unwrap();
        assert_eq!(store.len(), 1);
        assert!(matches!(
            store.store("p1", &piece),
            Err(CorpusError::DuplicatePiece(_))
        ));

        assert_eq!(store.ids().unwrap(), vec!["p1".to_string()]);
        let loaded = store.load_all().unwrap();
        assert_eq!(loaded, vec![StoredPiece { id: "p1".into(), piece }]);
    }
}
