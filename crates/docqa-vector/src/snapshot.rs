//! Index snapshot model and crash-safe persistence.
//!
//! A snapshot is written as JSON to `<path>.tmp`, fsynced, then renamed over
//! `<path>`. Readers therefore see either the previous snapshot or the new
//! one, never a partial write. A leftover `.tmp` from an interrupted write is
//! discarded on load.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use docqa_core::error::{DocqaError, Result};
use docqa_core::types::Chunk;

/// On-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// The complete set of indexed chunks, in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub format_version: u32,
    /// Incremented on every persisted mutation.
    pub version: u64,
    pub dimension: usize,
    pub chunks: Vec<Chunk>,
}

impl IndexSnapshot {
    pub fn new(dimension: usize) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            version: 0,
            dimension,
            chunks: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Check structural invariants: supported format, unique ids and a
    /// uniform embedding dimension.
    pub fn validate(&self) -> Result<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(DocqaError::Serialization(format!(
                "unsupported snapshot format version {}",
                self.format_version
            )));
        }
        let mut seen = HashSet::with_capacity(self.chunks.len());
        for chunk in &self.chunks {
            if !seen.insert(chunk.id) {
                return Err(DocqaError::Serialization(format!(
                    "duplicate chunk id {} in snapshot",
                    chunk.id
                )));
            }
            if chunk.embedding.len() != self.dimension {
                return Err(DocqaError::Serialization(format!(
                    "chunk {} has dimension {}, snapshot expects {}",
                    chunk.id,
                    chunk.embedding.len(),
                    self.dimension
                )));
            }
        }
        Ok(())
    }

    /// Persist atomically. Any failure leaves the file at `path` untouched and
    /// is reported as `PersistFailure`.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let tmp = tmp_path(path);
        let result = self.write_via(&tmp, path);
        if let Err(ref e) = result {
            if tmp.is_file() {
                let _ = fs::remove_file(&tmp);
            }
            warn!(path = %path.display(), error = %e, "Snapshot write failed");
        }
        result.map_err(|e| DocqaError::PersistFailure(e.to_string()))
    }

    fn write_via(&self, tmp: &Path, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let bytes = serde_json::to_vec(self)?;
        {
            let mut file = fs::File::create(tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(tmp, path)?;
        sync_parent(path)?;
        info!(
            path = %path.display(),
            version = self.version,
            chunks = self.chunks.len(),
            bytes = bytes.len(),
            "Snapshot persisted"
        );
        Ok(())
    }

    /// Read and validate the snapshot at `path`. `Ok(None)` on cold start.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        let tmp = tmp_path(path);
        if tmp.is_file() {
            warn!(path = %tmp.display(), "Discarding snapshot left by an interrupted write");
            fs::remove_file(&tmp)?;
        }

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: IndexSnapshot = serde_json::from_slice(&bytes)?;
        snapshot.validate()?;
        info!(
            path = %path.display(),
            version = snapshot.version,
            chunks = snapshot.chunks.len(),
            "Snapshot loaded"
        );
        Ok(Some(snapshot))
    }
}

/// Temporary path used while writing the snapshot at `path`.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::File::open(parent)?.sync_all(),
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::types::ChunkMetadata;
    use uuid::Uuid;

    fn chunk(source: &str, dim: usize) -> Chunk {
        Chunk {
            id: Uuid::new_v4(),
            embedding: vec![0.5; dim],
            content: format!("content of {}", source),
            metadata: ChunkMetadata {
                source: source.to_string(),
                page: 0,
                ordinal: 0,
            },
        }
    }

    #[test]
    fn test_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let mut snapshot = IndexSnapshot::new(4);
        snapshot.chunks.push(chunk("a", 4));
        snapshot.version = 3;
        snapshot.write_atomic(&path).unwrap();

        let loaded = IndexSnapshot::read(&path).unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn test_read_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(IndexSnapshot::read(&dir.path().join("index.json"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_read_discards_stale_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        IndexSnapshot::new(4).write_atomic(&path).unwrap();
        fs::write(tmp_path(&path), b"{ half written").unwrap();

        let loaded = IndexSnapshot::read(&path).unwrap().unwrap();
        assert_eq!(loaded.dimension, 4);
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn test_failed_write_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let mut first = IndexSnapshot::new(4);
        first.chunks.push(chunk("a", 4));
        first.write_atomic(&path).unwrap();

        // A directory squatting on the temp path makes the write fail.
        fs::create_dir(tmp_path(&path)).unwrap();
        let mut second = first.clone();
        second.chunks.push(chunk("b", 4));
        let err = second.write_atomic(&path).unwrap_err();
        assert!(matches!(err, DocqaError::PersistFailure(_)));

        fs::remove_dir(tmp_path(&path)).unwrap();
        let loaded = IndexSnapshot::read(&path).unwrap().unwrap();
        assert_eq!(loaded, first);
    }

    #[test]
    fn test_validate_rejects_duplicates_and_bad_dimension() {
        let mut snapshot = IndexSnapshot::new(4);
        let c = chunk("a", 4);
        snapshot.chunks.push(c.clone());
        snapshot.chunks.push(c);
        assert!(snapshot.validate().is_err());

        let mut snapshot = IndexSnapshot::new(4);
        snapshot.chunks.push(chunk("a", 3));
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn test_corrupt_snapshot_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            IndexSnapshot::read(&path),
            Err(DocqaError::Serialization(_))
        ));
    }
}
