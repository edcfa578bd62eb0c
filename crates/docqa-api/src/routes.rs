//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use docqa_core::error::{DocqaError, Result};

use crate::handlers;
use crate::state::AppState;

/// Upper bound for a single uploaded document.
const UPLOAD_BODY_LIMIT: usize = 64 * 1024 * 1024;
/// Upper bound for every other request body.
const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

fn local_origins(port: u16) -> Vec<HeaderValue> {
    let dev_port = port.saturating_add(1);
    [port, dev_port]
        .into_iter()
        .flat_map(|p| {
            [
                format!("http://127.0.0.1:{}", p),
                format!("http://localhost:{}", p),
            ]
        })
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect()
}

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(local_origins(state.config.general.port)))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let document_routes = Router::new()
        .route("/documents", get(handlers::list_documents))
        .route("/documents/studied", get(handlers::studied_documents))
        .route("/documents/delete", post(handlers::delete_documents))
        .route(
            "/documents/upload/{file_name}",
            post(handlers::upload_document).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/documents/{id}", delete(handlers::remove_document))
        .route("/index/rebuild", post(handlers::rebuild_index))
        .route("/index/reconcile", post(handlers::reconcile_index));

    let chat_routes = Router::new()
        .route("/query", post(handlers::query))
        .route("/query/stream", post(handlers::query_stream))
        .route("/chat/history", get(handlers::chat_history))
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/{session_id}", delete(handlers::delete_session));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(document_routes)
        .merge(chat_routes)
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API on 127.0.0.1 at the configured port until `shutdown`
/// resolves.
pub async fn start_server<F>(state: AppState, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr = format!("127.0.0.1:{}", state.config.general.port);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| DocqaError::Config(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!(addr = %addr, "Starting API server");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(DocqaError::Io)?;

    Ok(())
}
