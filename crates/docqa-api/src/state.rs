//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use docqa_chat::StreamingOrchestrator;
use docqa_core::config::DocqaConfig;
use docqa_core::traits::HistoryStore;
use docqa_vector::{ChunkIndex, IndexCoordinator};

/// Shared application state.
///
/// Every service is constructed by the caller and injected here, so tests
/// can assemble the same router over in-memory collaborators.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DocqaConfig>,
    /// Ingest, deletion and repair across catalog and index.
    pub coordinator: Arc<IndexCoordinator>,
    pub orchestrator: Arc<StreamingOrchestrator>,
    pub history: Arc<dyn HistoryStore>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: DocqaConfig,
        coordinator: Arc<IndexCoordinator>,
        orchestrator: Arc<StreamingOrchestrator>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            coordinator,
            orchestrator,
            history,
            start_time: Instant::now(),
        }
    }

    pub fn index(&self) -> &Arc<ChunkIndex> {
        self.coordinator.index()
    }
}
