//! docqa core crate - configuration, errors, domain types, stream events and
//! the collaborator traits shared by every other crate.

pub mod config;
pub mod error;
pub mod events;
pub mod traits;
pub mod types;

pub use config::DocqaConfig;
pub use error::{DocqaError, Result};
pub use events::StreamEvent;
pub use traits::{BlobStore, DocumentCatalog, HistoryStore};
pub use types::*;
