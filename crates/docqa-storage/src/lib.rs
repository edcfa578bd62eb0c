//! docqa storage crate - SQLite persistence for the document catalog and the
//! conversation log, plus document blob stores.

pub mod blob;
pub mod catalog;
pub mod db;
pub mod history;
pub mod migrations;

pub use blob::{FsBlobStore, MemoryBlobStore};
pub use catalog::DocumentRepository;
pub use db::Database;
pub use history::HistoryRepository;

use chrono::{TimeZone, Utc};

use docqa_core::error::{DocqaError, Result};
use docqa_core::types::Timestamp;

pub(crate) fn timestamp_from_millis(millis: i64) -> Result<Timestamp> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| DocqaError::Storage(format!("Invalid timestamp: {}", millis)))
}
