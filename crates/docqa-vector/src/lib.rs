//! docqa vector crate - embedding seam, persistent chunk index, document
//! splitting and the catalog/index consistency coordinator.

pub mod chunker;
pub mod coordinator;
pub mod embedding;
pub mod index;
pub mod search;
pub mod snapshot;

pub use chunker::TextSplitter;
pub use coordinator::{
    DocumentFailure, IndexCoordinator, RebuildReport, ReconcileReport, RemoveOutcome,
};
pub use embedding::{EmbeddingEngine, HashEmbedding};
pub use index::{ChunkIndex, DeleteOutcome, ScoredChunk};
pub use search::{CosineSearch, VectorSearch};
pub use snapshot::IndexSnapshot;
