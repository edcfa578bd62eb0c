//! Collaborator seams injected into the index and chat services.

use uuid::Uuid;

use crate::error::Result;
use crate::types::{ChunkId, ConversationTurn, DocumentState, SessionSummary, SourceDocument};

/// Raw document byte storage keyed by file name.
pub trait BlobStore: Send + Sync {
    fn upload(&self, key: &str, bytes: &[u8]) -> Result<()>;
    /// `DocqaError::NotFound` when the key does not exist.
    fn download(&self, key: &str) -> Result<Vec<u8>>;
    /// Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<()>;
}

/// Relational record of every uploaded document and its index state.
pub trait DocumentCatalog: Send + Sync {
    fn insert(&self, document: &SourceDocument) -> Result<()>;
    fn get(&self, id: Uuid) -> Result<Option<SourceDocument>>;
    fn find_by_path(&self, file_path: &str) -> Result<Option<SourceDocument>>;
    /// Every document not flagged deleted, oldest first.
    fn list(&self) -> Result<Vec<SourceDocument>>;
    fn list_by_state(&self, state: DocumentState) -> Result<Vec<SourceDocument>>;
    /// Uploaded or Stale documents not flagged deleted, oldest first.
    fn list_pending(&self) -> Result<Vec<SourceDocument>>;
    /// Rows left with the deleted flag by an interrupted removal.
    fn list_deleted(&self) -> Result<Vec<SourceDocument>>;
    fn mark_indexed(&self, id: Uuid, chunk_ids: &[ChunkId]) -> Result<()>;
    /// Flip every Indexed document whose path is in `file_paths` to Stale and
    /// clear its chunk ids. Returns the number of rows changed.
    fn mark_stale(&self, file_paths: &[String]) -> Result<usize>;
    /// Set the deleted flag and move the row to the Deleted state.
    fn mark_deleted(&self, id: Uuid) -> Result<()>;
    /// Return a document to Uploaded after its blob was replaced.
    fn reset_uploaded(&self, id: Uuid) -> Result<()>;
    /// Drop the row entirely. Returns whether a row existed.
    fn remove(&self, id: Uuid) -> Result<bool>;
}

/// Append-only conversation log.
pub trait HistoryStore: Send + Sync {
    /// Persist a turn, creating its session on first use.
    fn append(&self, turn: &ConversationTurn) -> Result<()>;
    /// Turns of a session, oldest first.
    fn turns(&self, session_id: &str, user_id: &str) -> Result<Vec<ConversationTurn>>;
    /// Live sessions of a user, newest first.
    fn sessions(&self, user_id: &str) -> Result<Vec<SessionSummary>>;
    /// Soft-delete a session. Returns whether it existed.
    fn delete_session(&self, session_id: &str, user_id: &str) -> Result<bool>;
}
