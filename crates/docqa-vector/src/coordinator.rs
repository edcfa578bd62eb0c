//! Keeps the document catalog and the chunk index consistent.
//!
//! Per-document lifecycle: Uploaded -> Indexed -> Stale -> Indexed ..., and
//! any state -> Deleted. Every mutating operation holds one coordinator-wide
//! lock so index writes and catalog updates from different callers never
//! interleave.
//!
//! Deleting from the index and flipping the catalog are two separate writes.
//! If the catalog write fails the index keeps the deletion and the affected
//! documents stay Indexed without chunks until `reconcile` runs.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use docqa_core::error::{DocqaError, Result};
use docqa_core::traits::{BlobStore, DocumentCatalog};
use docqa_core::types::{DocumentState, SourceDocument};

use crate::chunker::TextSplitter;
use crate::index::{ChunkIndex, DeleteOutcome};

/// A document that could not be indexed during a rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentFailure {
    pub document_id: Uuid,
    pub file_name: String,
    pub error: String,
}

/// Aggregate result of `rebuild_index`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    /// Documents moved to Indexed.
    pub indexed: usize,
    pub chunks_added: usize,
    pub failures: Vec<DocumentFailure>,
}

/// Result of removing a document entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoveOutcome {
    pub document_id: Uuid,
    pub chunks_removed: usize,
}

/// Repairs applied by `reconcile`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Indexed documents whose chunks were missing, now Stale.
    pub marked_stale: Vec<String>,
    /// Chunks with no Indexed document behind them.
    pub orphan_chunks_removed: usize,
    /// Rows left behind by an interrupted removal.
    pub purged_documents: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.marked_stale.is_empty() && self.orphan_chunks_removed == 0 && self.purged_documents == 0
    }
}

/// Drives ingest, deletion and repair across the index and the catalog.
pub struct IndexCoordinator {
    index: Arc<ChunkIndex>,
    catalog: Arc<dyn DocumentCatalog>,
    blobs: Arc<dyn BlobStore>,
    splitter: TextSplitter,
    lock: Mutex<()>,
}

impl IndexCoordinator {
    pub fn new(
        index: Arc<ChunkIndex>,
        catalog: Arc<dyn DocumentCatalog>,
        blobs: Arc<dyn BlobStore>,
        splitter: TextSplitter,
    ) -> Self {
        Self {
            index,
            catalog,
            blobs,
            splitter,
            lock: Mutex::new(()),
        }
    }

    pub fn index(&self) -> &Arc<ChunkIndex> {
        &self.index
    }

    /// Source identifier a blob named `file_name` is indexed under.
    pub fn source_path(&self, file_name: &str) -> String {
        let root = self.index.source_root();
        if root.as_os_str().is_empty() {
            file_name.to_string()
        } else {
            root.join(file_name).to_string_lossy().into_owned()
        }
    }

    // =========================================================================
    // Upload
    // =========================================================================

    /// Store a document and register it as Uploaded.
    ///
    /// Re-uploading an existing file replaces its blob, drops its chunks and
    /// returns it to Uploaded.
    pub async fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<SourceDocument> {
        if file_name.trim().is_empty() {
            return Err(DocqaError::InvalidInput("file name must not be empty".to_string()));
        }
        let _guard = self.lock.lock().await;

        let file_path = self.source_path(file_name);
        if let Some(existing) = self.catalog.find_by_path(&file_path)? {
            if existing.deleted {
                return Err(DocqaError::InvalidInput(format!(
                    "{} is being removed",
                    file_name
                )));
            }
            self.blobs.upload(file_name, bytes)?;
            self.index.delete(&[file_path.clone()]).await?;
            self.catalog.reset_uploaded(existing.id)?;
            info!(document_id = %existing.id, file_name, "Document replaced");
            return self
                .catalog
                .get(existing.id)?
                .ok_or_else(|| DocqaError::NotFound(format!("document {}", existing.id)));
        }

        self.blobs.upload(file_name, bytes)?;
        let document = SourceDocument::new(file_name, file_path);
        self.catalog.insert(&document)?;
        info!(document_id = %document.id, file_name, size = bytes.len(), "Document uploaded");
        Ok(document)
    }

    // =========================================================================
    // Rebuild
    // =========================================================================

    /// Index every Uploaded or Stale document. One document failing does not
    /// stop the others; failures are collected in the report.
    pub async fn rebuild_index(&self) -> Result<RebuildReport> {
        let _guard = self.lock.lock().await;

        let pending = self.catalog.list_pending()?;
        info!(pending = pending.len(), "Rebuilding index");

        let mut report = RebuildReport::default();
        for document in pending {
            match self.ingest(&document).await {
                Ok(chunks) => {
                    report.indexed += 1;
                    report.chunks_added += chunks;
                    info!(document_id = %document.id, chunks, "Document indexed");
                }
                Err(e) => {
                    warn!(
                        document_id = %document.id,
                        file_name = %document.file_name,
                        error = %e,
                        "Document failed to index"
                    );
                    report.failures.push(DocumentFailure {
                        document_id: document.id,
                        file_name: document.file_name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            indexed = report.indexed,
            chunks_added = report.chunks_added,
            failed = report.failures.len(),
            "Index rebuild finished"
        );
        Ok(report)
    }

    async fn ingest(&self, document: &SourceDocument) -> Result<usize> {
        let bytes = self.blobs.download(&document.file_name)?;
        let text = String::from_utf8(bytes).map_err(|_| {
            DocqaError::InvalidInput(format!("{} is not valid UTF-8 text", document.file_name))
        })?;
        let chunks = self.splitter.split_document(&text, &document.file_path);
        if chunks.is_empty() {
            return Err(DocqaError::InvalidInput(format!(
                "{} has no extractable text",
                document.file_name
            )));
        }

        // Chunks left by an ingest that never reached the catalog.
        self.index.delete(&[document.file_path.clone()]).await?;

        let ids = self.index.add(chunks).await?;
        if let Err(e) = self.catalog.mark_indexed(document.id, &ids) {
            error!(
                document_id = %document.id,
                error = %e,
                "Chunks indexed but catalog not updated"
            );
            return Err(e);
        }
        Ok(ids.len())
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Remove the chunks of the given sources and flip their documents to
    /// Stale so the next rebuild re-ingests them.
    pub async fn delete_from_index(&self, file_paths: &[String]) -> Result<DeleteOutcome> {
        let _guard = self.lock.lock().await;

        let outcome = self.index.delete(file_paths).await?;
        if let DeleteOutcome::Removed { ref sources, .. } = outcome {
            let affected: Vec<String> = sources.iter().cloned().collect();
            match self.catalog.mark_stale(&affected) {
                Ok(flipped) => {
                    info!(sources = affected.len(), flipped, "Documents marked stale");
                }
                Err(e) => {
                    error!(
                        sources = ?affected,
                        error = %e,
                        "Chunks deleted but catalog not updated; run reconcile"
                    );
                    return Err(e);
                }
            }
        }
        Ok(outcome)
    }

    /// Remove a document, its chunks and its blob.
    pub async fn remove_document(&self, id: Uuid) -> Result<RemoveOutcome> {
        let _guard = self.lock.lock().await;

        let document = self
            .catalog
            .get(id)?
            .ok_or_else(|| DocqaError::NotFound(format!("document {}", id)))?;
        let chunks_removed = self.purge(&document).await?;
        info!(document_id = %id, chunks_removed, "Document removed");
        Ok(RemoveOutcome {
            document_id: id,
            chunks_removed,
        })
    }

    /// Flag, then delete chunks, blob and row. A crash part way leaves the
    /// flag set for `reconcile` to finish.
    async fn purge(&self, document: &SourceDocument) -> Result<usize> {
        if !document.deleted {
            self.catalog.mark_deleted(document.id)?;
        }
        let outcome = self.index.delete(&[document.file_path.clone()]).await?;
        self.blobs.delete(&document.file_name)?;
        self.catalog.remove(document.id)?;
        Ok(outcome.removed_count())
    }

    // =========================================================================
    // Repair
    // =========================================================================

    /// Bring catalog and index back in line after a partial failure.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let _guard = self.lock.lock().await;
        let mut report = ReconcileReport::default();

        for document in self.catalog.list_deleted()? {
            warn!(document_id = %document.id, "Finishing interrupted document removal");
            self.purge(&document).await?;
            report.purged_documents += 1;
        }

        let present: HashSet<Uuid> = match self.index.load().await? {
            Some(snapshot) => snapshot.chunks.iter().map(|c| c.id).collect(),
            None => HashSet::new(),
        };
        for document in self.catalog.list_by_state(DocumentState::Indexed)? {
            let complete = !document.chunk_ids.is_empty()
                && document.chunk_ids.iter().all(|id| present.contains(id));
            if !complete {
                warn!(
                    document_id = %document.id,
                    file_path = %document.file_path,
                    "Indexed document is missing chunks, marking stale"
                );
                report.marked_stale.push(document.file_path.clone());
            }
        }
        if !report.marked_stale.is_empty() {
            self.index.delete(&report.marked_stale).await?;
            self.catalog.mark_stale(&report.marked_stale)?;
        }

        let indexed: HashSet<PathBuf> = self
            .catalog
            .list_by_state(DocumentState::Indexed)?
            .iter()
            .map(|d| self.index.normalize_source(&d.file_path))
            .collect();
        let orphans: Vec<String> = self
            .index
            .sources()
            .await?
            .into_iter()
            .filter(|s| !indexed.contains(&self.index.normalize_source(s)))
            .collect();
        if !orphans.is_empty() {
            warn!(sources = ?orphans, "Removing chunks with no indexed document");
            report.orphan_chunks_removed = self.index.delete(&orphans).await?.removed_count();
        }

        if report.is_clean() {
            info!("Catalog and index are consistent");
        } else {
            info!(
                marked_stale = report.marked_stale.len(),
                orphan_chunks_removed = report.orphan_chunks_removed,
                purged_documents = report.purged_documents,
                "Reconcile applied repairs"
            );
        }
        Ok(report)
    }

    // =========================================================================
    // Listings
    // =========================================================================

    pub fn documents(&self) -> Result<Vec<SourceDocument>> {
        self.catalog.list()
    }

    pub fn document(&self, id: Uuid) -> Result<Option<SourceDocument>> {
        self.catalog.get(id)
    }

    /// Sources currently present in the index.
    pub async fn studied_sources(&self) -> Result<Vec<String>> {
        self.index.sources().await
    }
}
