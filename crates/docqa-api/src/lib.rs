//! docqa API crate - axum HTTP server, route handlers, SSE answer streaming.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod sse;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
