//! JSON-per-piece directory store
//!
//! Each piece is written to `<root>/dataset_<id>.json`. Writes go through a
//! hidden temporary file that is then hard-linked into place. Linking fails
//! if the document exists, so documents are never overwritten, and a failed
//! write leaves every earlier document intact.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use super::{PieceId, PieceStore, StoredPiece};
use crate::error::{CorpusError, Result};
use crate::segment::SplitPiece;

const FILE_PREFIX: &str = "dataset_";
const FILE_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    /// Open a store, creating the directory if needed
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| CorpusError::io(&root, e))?;
        Ok(Self { root })
    }

    /// Open an existing store directory
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(CorpusError::io(
                &root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "store directory does not exist"),
            ));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Document path for a piece id
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}{}.{}", FILE_PREFIX, id, FILE_EXTENSION))
    }

    fn id_for(path: &Path) -> PieceId {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        stem.strip_prefix(FILE_PREFIX).unwrap_or(stem).to_string()
    }

    /// Every `.json` document under the root, recursively, sorted by path
    fn document_paths(&self) -> Result<Vec<PathBuf>> {
        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .build();

        let mut paths = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| {
                let io = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "directory walk failed"));
                CorpusError::io(&self.root, io)
            })?;
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(FILE_EXTENSION) {
                paths.push(path.to_path_buf());
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn read_document(path: &Path) -> Result<StoredPiece> {
        let bytes = std::fs::read(path).map_err(|e| CorpusError::io(path, e))?;
        let piece: SplitPiece = serde_json::from_slice(&bytes).map_err(|source| CorpusError::Document {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(StoredPiece {
            id: Self::id_for(path),
            piece,
        })
    }
}

impl PieceStore for JsonDirStore {
    fn store(&self, id: &str, piece: &SplitPiece) -> Result<()> {
        let path = self.path_for(id);
        // Early out only; the hard link below is what refuses to overwrite
        if path.exists() {
            return Err(CorpusError::DuplicatePiece(id.to_string()));
        }

        let json = serde_json::to_vec(piece).map_err(|source| CorpusError::Document {
            path: path.clone(),
            source,
        })?;

        let tmp = self.root.join(format!(".{}{}.{}.tmp", FILE_PREFIX, id, FILE_EXTENSION));
        if let Err(e) = std::fs::write(&tmp, &json) {
            let _ = std::fs::remove_file(&tmp);
            return Err(CorpusError::io(&tmp, e));
        }
        let linked = std::fs::hard_link(&tmp, &path);
        let _ = std::fs::remove_file(&tmp);
        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(CorpusError::DuplicatePiece(id.to_string()));
            }
            Err(e) => return Err(CorpusError::io(&path, e)),
        }

        tracing::debug!("Stored piece {} ({} bytes)", id, json.len());
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<StoredPiece>> {
        let paths = self.document_paths()?;
        tracing::info!("Loading {} documents from {:?}", paths.len(), self.root);
        paths.iter().map(|p| Self::read_document(p)).collect()
    }

    fn ids(&self) -> Result<Vec<PieceId>> {
        Ok(self.document_paths()?.iter().map(|p| Self::id_for(p)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_piece(offset: u32) -> SplitPiece {
        let mut voices = BTreeMap::new();
        voices.insert(0, vec![vec![offset, 2, 3], vec![offset + 1]]);
        voices.insert(1, vec![vec![7], vec![8, 9, offset]]);
        SplitPiece::new(voices)
    }

    #[test]
    fn test_store_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::create(dir.path()).unwrap();

        store.store("b", &sample_piece(20)).unwrap();
        store.store("a", &sample_piece(10)).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, "a");
        assert_eq!(loaded[0].piece, sample_piece(10));
        assert_eq!(loaded[1].id, "b");
        assert_eq!(loaded[1].piece, sample_piece(20));
    }

    #[test]
    fn test_document_layout_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::create(dir.path()).unwrap();
        store.store("x1", &sample_piece(5)).unwrap();

        let raw = std::fs::read_to_string(store.path_for("x1")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["0"][0], serde_json::json!([5, 2, 3]));
        assert_eq!(value["1"][1], serde_json::json!([8, 9, 5]));
        // No temporary files left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::create(dir.path()).unwrap();
        store.store("same", &sample_piece(1)).unwrap();

        let err = store.store("same", &sample_piece(2)).unwrap_err();
        assert!(matches!(err, CorpusError::DuplicatePiece(_)));
        // Original document untouched
        assert_eq!(store.load_all().unwrap()[0].piece, sample_piece(1));
    }

    #[test]
    fn test_failed_write_keeps_earlier_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::create(dir.path()).unwrap();
        store.store("first", &sample_piece(1)).unwrap();

        // A directory squatting on the temporary path makes the write fail
        std::fs::create_dir(dir.path().join(".dataset_second.json.tmp")).unwrap();
        let err = store.store("second", &sample_piece(2)).unwrap_err();
        assert!(matches!(err, CorpusError::Io { .. }));

        assert!(!store.path_for("second").exists());
        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "first");
        assert_eq!(loaded[0].piece, sample_piece(1));
    }

    #[test]
    fn test_ids_match_loaded_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::create(dir.path()).unwrap();
        store.store("000001", &sample_piece(1)).unwrap();
        store.store("000000", &sample_piece(2)).unwrap();

        assert_eq!(store.ids().unwrap(), vec!["000000", "000001"]);
        assert_eq!(store.root(), dir.path());
    }

    #[test]
    fn test_load_walks_subdirectories_and_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("batch2");
        let store = JsonDirStore::create(dir.path()).unwrap();
        let nested_store = JsonDirStore::create(&nested).unwrap();

        store.store("top", &sample_piece(1)).unwrap();
        nested_store.store("deep", &sample_piece(2)).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a document").unwrap();

        let loaded = store.load_all().unwrap();
        let ids: Vec<_> = loaded.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["deep", "top"]);
    }

    #[test]
    fn test_corrupt_document_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::create(dir.path()).unwrap();
        std::fs::write(dir.path().join("dataset_bad.json"), "{\"0\": [[1, 2]").unwrap();

        let err = store.load_all().unwrap_err();
        assert!(matches!(err, CorpusError::Document { .. }));
    }

    #[test]
    fn test_open_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonDirStore::open(dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, CorpusError::Io { .. }));
    }

    #[test]
    fn test_empty_store_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::create(dir.path()).unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }
}
