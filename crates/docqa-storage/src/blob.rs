//! Document blob stores.
//!
//! `FsBlobStore` keeps one file per key under a root directory and writes
//! through a temporary file so a crash never leaves a torn blob.
//! `MemoryBlobStore` backs tests and ephemeral deployments.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, info};

use docqa_core::error::{DocqaError, Result};
use docqa_core::traits::BlobStore;

/// Reject keys that could escape the store root.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key == "."
        || key == ".."
        || key.contains('/')
        || key.contains('\\')
        || key.contains('\0')
    {
        return Err(DocqaError::InvalidInput(format!("invalid blob key: {:?}", key)));
    }
    Ok(())
}

/// Filesystem-backed blob store.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        info!(root = %root.display(), "Blob store opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path a key is stored at.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

impl BlobStore for FsBlobStore {
    fn upload(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = self.root.join(format!(".{}.tmp", key));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(key, size = bytes.len(), "Blob stored");
        Ok(())
    }

    fn download(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DocqaError::NotFound(format!("blob {}", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(key, "Blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory blob store.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn upload(&self, key: &str, bytes: &[u8]) -> Result<()> {
        validate_key(key)?;
        self.blobs
            .write()
            .map_err(|e| DocqaError::Storage(format!("Blob lock poisoned: {}", e)))?
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn download(&self, key: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .map_err(|e| DocqaError::Storage(format!("Blob lock poisoned: {}", e)))?
            .get(key)
            .cloned()
            .ok_or_else(|| DocqaError::NotFound(format!("blob {}", key)))
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.blobs
            .write()
            .map_err(|e| DocqaError::Storage(format!("Blob lock poisoned: {}", e)))?
            .remove(key);
        Ok(())
    }
}
