//! docqa server binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Open the SQLite catalog/history and the blob directory
//! 3. Open the chunk index and repair any catalog/index drift
//! 4. Start the axum API server and stop cleanly on Ctrl-C

mod cli;

use std::sync::Arc;

use clap::Parser;

use docqa_api::{start_server, AppState};
use docqa_chat::{ConversationMemory, ExtractiveGeneration, OrchestratorConfig, StreamingOrchestrator};
use docqa_core::config::DocqaConfig;
use docqa_core::traits::HistoryStore;
use docqa_storage::{Database, DocumentRepository, FsBlobStore, HistoryRepository};
use docqa_vector::{ChunkIndex, HashEmbedding, IndexCoordinator, TextSplitter};

use cli::CliArgs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config. Loaded before tracing so the configured level applies.
    let config_file = args.resolve_config_path();
    let (mut config, load_error) = match DocqaConfig::load(&config_file) {
        Ok(config) => (config, None),
        Err(e) => (DocqaConfig::default(), Some(e)),
    };
    config.merge_env();
    args.apply(&mut config);

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting docqa v{}", env!("CARGO_PKG_VERSION"));
    match load_error {
        None => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Some(e) if config_file.exists() => {
            tracing::warn!(path = %config_file.display(), error = %e, "Invalid config, using defaults")
        }
        Some(_) => tracing::info!(path = %config_file.display(), "No config file, using defaults"),
    }
    config.validate()?;

    // Storage.
    let data_dir = config.data_dir();
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = config.db_path();
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    let catalog = Arc::new(DocumentRepository::new(Arc::clone(&db)));
    let history: Arc<dyn HistoryStore> = Arc::new(HistoryRepository::new(Arc::clone(&db)));
    let blobs = Arc::new(FsBlobStore::new(config.blob_dir())?);

    // Index.
    let index = Arc::new(
        ChunkIndex::new(config.snapshot_path(), Arc::new(HashEmbedding::new()))
            .with_source_root(config.source_root()),
    );
    let splitter = TextSplitter::new(config.ingest.chunk_size, config.ingest.chunk_overlap)?;
    let coordinator = Arc::new(IndexCoordinator::new(
        Arc::clone(&index),
        catalog,
        blobs,
        splitter,
    ));

    match coordinator.reconcile().await {
        Ok(report) if report.is_clean() => tracing::info!("Catalog and index consistent"),
        Ok(report) => tracing::warn!(
            marked_stale = report.marked_stale.len(),
            orphan_chunks_removed = report.orphan_chunks_removed,
            purged_documents = report.purged_documents,
            "Repaired catalog/index drift"
        ),
        Err(e) => tracing::warn!(error = %e, "Startup reconcile failed"),
    }

    if args.rebuild_on_start {
        let report = coordinator.rebuild_index().await?;
        tracing::info!(
            indexed = report.indexed,
            chunks_added = report.chunks_added,
            failures = report.failures.len(),
            "Startup rebuild finished"
        );
    }

    // Answering.
    let orchestrator = Arc::new(StreamingOrchestrator::new(
        index,
        Arc::new(ExtractiveGeneration::new(config.index.top_k)),
        ConversationMemory::new(Arc::clone(&history), config.chat.max_history_turns),
        OrchestratorConfig::from_chat_config(&config.chat, config.index.top_k),
    ));

    // === API server ===

    let state = AppState::new(config, coordinator, Arc::clone(&orchestrator), history);
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
        orchestrator.shutdown();
    };

    start_server(state, shutdown).await?;
    tracing::info!("Server stopped");

    Ok(())
}
