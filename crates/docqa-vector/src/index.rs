//! Persistent, incrementally updated chunk index.
//!
//! The live snapshot sits behind `RwLock<Option<Arc<IndexSnapshot>>>`.
//! Readers clone the `Arc` and search without holding the lock. Writers are
//! serialized by an async mutex, build the next snapshot off to the side,
//! persist it, and only then swap it in. A failed persist leaves both the
//! file and the in-memory view on the previous snapshot.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeSet, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use docqa_core::error::{DocqaError, Result};
use docqa_core::types::{Chunk, ChunkId, NewChunk};

use crate::embedding::EmbeddingEngine;
use crate::search::{CosineSearch, VectorSearch};
use crate::snapshot::IndexSnapshot;

/// A retrieved chunk and its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Result of deleting by source identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// No chunk matched any identifier; nothing was written.
    NothingRemoved,
    /// Chunks were removed and the new snapshot persisted.
    Removed {
        count: usize,
        /// Affected sources, as stored in chunk metadata.
        sources: BTreeSet<String>,
    },
}

impl DeleteOutcome {
    pub fn removed_count(&self) -> usize {
        match self {
            DeleteOutcome::NothingRemoved => 0,
            DeleteOutcome::Removed { count, .. } => *count,
        }
    }
}

/// The mutable chunk index.
pub struct ChunkIndex {
    path: PathBuf,
    source_root: PathBuf,
    embedder: Arc<dyn EmbeddingEngine>,
    search: Arc<dyn VectorSearch>,
    current: RwLock<Option<Arc<IndexSnapshot>>>,
    loaded: AtomicBool,
    write_lock: Mutex<()>,
}

impl ChunkIndex {
    /// Create an index persisted at `path`. Nothing is read until first use.
    pub fn new(path: impl Into<PathBuf>, embedder: Arc<dyn EmbeddingEngine>) -> Self {
        Self {
            path: path.into(),
            source_root: PathBuf::new(),
            embedder,
            search: Arc::new(CosineSearch),
            current: RwLock::new(None),
            loaded: AtomicBool::new(false),
            write_lock: Mutex::new(()),
        }
    }

    /// Root that relative source identifiers are resolved against.
    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_root = root.into();
        self
    }

    pub fn with_search(mut self, search: Arc<dyn VectorSearch>) -> Self {
        self.search = search;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingEngine> {
        &self.embedder
    }

    // =========================================================================
    // Snapshot access
    // =========================================================================

    fn current(&self) -> Result<Option<Arc<IndexSnapshot>>> {
        self.current
            .read()
            .map(|guard| guard.clone())
            .map_err(|e| DocqaError::Storage(format!("Index lock poisoned: {}", e)))
    }

    fn swap(&self, next: IndexSnapshot) -> Result<()> {
        let mut guard = self
            .current
            .write()
            .map_err(|e| DocqaError::Storage(format!("Index lock poisoned: {}", e)))?;
        *guard = Some(Arc::new(next));
        Ok(())
    }

    /// Read the persisted snapshot once. Caller holds `write_lock`.
    fn load_locked(&self) -> Result<()> {
        if self.loaded.load(Ordering::Acquire) {
            return Ok(());
        }
        let snapshot = IndexSnapshot::read(&self.path)?;
        if let Some(ref s) = snapshot {
            let expected = self.embedder.dimensions();
            if s.dimension != expected {
                return Err(DocqaError::Serialization(format!(
                    "snapshot dimension {} does not match embedding dimension {}",
                    s.dimension, expected
                )));
            }
        }
        let mut guard = self
            .current
            .write()
            .map_err(|e| DocqaError::Storage(format!("Index lock poisoned: {}", e)))?;
        *guard = snapshot.map(Arc::new);
        self.loaded.store(true, Ordering::Release);
        Ok(())
    }

    /// The current snapshot, reading it from disk on first call. `None` on
    /// cold start.
    pub async fn load(&self) -> Result<Option<Arc<IndexSnapshot>>> {
        if !self.loaded.load(Ordering::Acquire) {
            let _guard = self.write_lock.lock().await;
            self.load_locked()?;
        }
        self.current()
    }

    /// Whether a snapshot exists to answer queries from.
    pub async fn is_available(&self) -> Result<bool> {
        Ok(self.load().await?.is_some())
    }

    /// Number of chunks in the current snapshot.
    pub async fn len(&self) -> Result<usize> {
        Ok(self.load().await?.map(|s| s.len()).unwrap_or(0))
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Embed and append chunks, creating the snapshot on first use.
    ///
    /// Returns the ids assigned, in input order. Embedding happens before the
    /// write lock is taken so a slow model does not block deletes.
    pub async fn add(&self, chunks: Vec<NewChunk>) -> Result<Vec<ChunkId>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(DocqaError::Embedding(format!(
                "expected {} vectors, engine returned {}",
                chunks.len(),
                embeddings.len()
            )));
        }
        let dimension = self.embedder.dimensions();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(DocqaError::Embedding(format!(
                "expected dimension {}, engine returned {}",
                dimension,
                bad.len()
            )));
        }

        let _guard = self.write_lock.lock().await;
        self.load_locked()?;

        let mut next = match self.current()? {
            Some(snapshot) => (*snapshot).clone(),
            None => IndexSnapshot::new(dimension),
        };
        if next.dimension != dimension {
            return Err(DocqaError::Embedding(format!(
                "snapshot dimension {} does not match embedding dimension {}",
                next.dimension, dimension
            )));
        }

        let mut taken: HashSet<ChunkId> = next.chunks.iter().map(|c| c.id).collect();
        let mut ids = Vec::with_capacity(chunks.len());
        for (new_chunk, embedding) in chunks.into_iter().zip(embeddings) {
            let mut id = Uuid::new_v4();
            while !taken.insert(id) {
                id = Uuid::new_v4();
            }
            ids.push(id);
            next.chunks.push(Chunk {
                id,
                embedding,
                content: new_chunk.content,
                metadata: new_chunk.metadata,
            });
        }
        next.version += 1;

        next.write_atomic(&self.path)?;
        let total = next.len();
        let version = next.version;
        self.swap(next)?;

        info!(added = ids.len(), total, version, "Chunks added to index");
        Ok(ids)
    }

    /// Remove every chunk whose source matches one of `identifiers`.
    ///
    /// Identifiers and stored sources are compared after normalization, so
    /// `books/a.pdf`, `./books/a.pdf` and `<root>/books/a.pdf` all match.
    pub async fn delete(&self, identifiers: &[String]) -> Result<DeleteOutcome> {
        let targets: HashSet<PathBuf> = identifiers
            .iter()
            .map(|id| self.normalize_source(id))
            .collect();
        if targets.is_empty() {
            return Ok(DeleteOutcome::NothingRemoved);
        }

        let _guard = self.write_lock.lock().await;
        self.load_locked()?;

        let Some(current) = self.current()? else {
            debug!("Delete on cold index, nothing to remove");
            return Ok(DeleteOutcome::NothingRemoved);
        };

        let mut sources = BTreeSet::new();
        let mut kept = Vec::with_capacity(current.chunks.len());
        for chunk in &current.chunks {
            if targets.contains(&self.normalize_source(&chunk.metadata.source)) {
                sources.insert(chunk.metadata.source.clone());
            } else {
                kept.push(chunk.clone());
            }
        }

        let count = current.chunks.len() - kept.len();
        if count == 0 {
            debug!(identifiers = identifiers.len(), "No chunks matched delete");
            return Ok(DeleteOutcome::NothingRemoved);
        }

        let next = IndexSnapshot {
            format_version: current.format_version,
            version: current.version + 1,
            dimension: current.dimension,
            chunks: kept,
        };
        next.write_atomic(&self.path)?;
        let version = next.version;
        self.swap(next)?;

        info!(removed = count, sources = sources.len(), version, "Chunks deleted from index");
        Ok(DeleteOutcome::Removed { count, sources })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The `k` chunks nearest to `vector`, best first. Equal scores keep
    /// insertion order.
    pub async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let snapshot = self.load().await?.ok_or_else(|| {
            DocqaError::IndexUnavailable("no documents have been indexed".to_string())
        })?;
        if vector.len() != snapshot.dimension {
            return Err(DocqaError::InvalidInput(format!(
                "query dimension {} does not match index dimension {}",
                vector.len(),
                snapshot.dimension
            )));
        }

        let mut scored = self.search.score(vector, &snapshot.chunks);
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(CmpOrdering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .filter_map(|(position, score)| {
                snapshot.chunks.get(position).map(|chunk| ScoredChunk {
                    chunk: chunk.clone(),
                    score,
                })
            })
            .collect())
    }

    /// Embed `text` and query with it.
    pub async fn query_text(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if !self.is_available().await? {
            return Err(DocqaError::IndexUnavailable(
                "no documents have been indexed".to_string(),
            ));
        }
        let vector = self.embedder.embed_one(text).await?;
        self.query(&vector, k).await
    }

    /// Distinct chunk sources, in insertion order.
    pub async fn sources(&self) -> Result<Vec<String>> {
        let Some(snapshot) = self.load().await? else {
            return Ok(Vec::new());
        };
        let mut seen = HashSet::new();
        Ok(snapshot
            .chunks
            .iter()
            .filter(|c| seen.insert(c.metadata.source.as_str()))
            .map(|c| c.metadata.source.clone())
            .collect())
    }

    /// Ids of every chunk whose source matches `source`.
    pub async fn chunk_ids_for(&self, source: &str) -> Result<Vec<ChunkId>> {
        let Some(snapshot) = self.load().await? else {
            return Ok(Vec::new());
        };
        let target = self.normalize_source(source);
        Ok(snapshot
            .chunks
            .iter()
            .filter(|c| self.normalize_source(&c.metadata.source) == target)
            .map(|c| c.id)
            .collect())
    }

    /// Resolve `source` against the source root and fold `.`/`..` lexically.
    pub fn normalize_source(&self, source: &str) -> PathBuf {
        let path = Path::new(source);
        let joined = if path.is_absolute() || self.source_root.as_os_str().is_empty() {
            path.to_path_buf()
        } else {
            self.source_root.join(path)
        };
        clean_path(&joined)
    }
}

/// Lexical path normalization. Does not touch the filesystem.
fn clean_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out.iter().collect()
}
