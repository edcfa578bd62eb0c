use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{DocqaError, Result};

/// Top-level configuration for the docqa service.
///
/// Loaded from `~/.docqa/config.toml` by default. Every section falls back to
/// its defaults when absent, so a partial file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocqaConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl DocqaConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DocqaConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file is missing
    /// or unparsable.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the configuration as pretty TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply `DOCQA_*` environment overrides. Unparsable values are ignored.
    pub fn merge_env(&mut self) {
        if let Ok(dir) = env::var("DOCQA_DATA_DIR") {
            self.general.data_dir = dir;
        }
        if let Ok(root) = env::var("DOCQA_SOURCE_ROOT") {
            self.index.source_root = root;
        }
        if let Ok(k) = env::var("DOCQA_TOP_K") {
            if let Ok(k) = k.parse() {
                self.index.top_k = k;
            }
        }
        if let Ok(size) = env::var("DOCQA_CHUNK_SIZE") {
            if let Ok(size) = size.parse() {
                self.ingest.chunk_size = size;
            }
        }
        if let Ok(overlap) = env::var("DOCQA_CHUNK_OVERLAP") {
            if let Ok(overlap) = overlap.parse() {
                self.ingest.chunk_overlap = overlap;
            }
        }
        if let Ok(secs) = env::var("DOCQA_TOKEN_IDLE_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                self.chat.token_idle_timeout_secs = secs;
            }
        }
    }

    /// Reject values the services cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.ingest.chunk_size == 0 {
            return Err(DocqaError::Config(
                "ingest.chunk_size must be non-zero".to_string(),
            ));
        }
        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            return Err(DocqaError::Config(
                "ingest.chunk_overlap must be less than ingest.chunk_size".to_string(),
            ));
        }
        if self.index.top_k == 0 {
            return Err(DocqaError::Config("index.top_k must be non-zero".to_string()));
        }
        if self.chat.token_queue_capacity == 0 {
            return Err(DocqaError::Config(
                "chat.token_queue_capacity must be non-zero".to_string(),
            ));
        }
        if self.chat.token_idle_timeout_secs == 0 {
            return Err(DocqaError::Config(
                "chat.token_idle_timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.chat.max_question_length == 0 {
            return Err(DocqaError::Config(
                "chat.max_question_length must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Absolute data directory with a leading `~` expanded.
    pub fn data_dir(&self) -> PathBuf {
        expand_home(&self.general.data_dir)
    }

    /// Path of the persisted index snapshot.
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir().join(&self.index.snapshot_file)
    }

    /// Path of the SQLite catalog/history database.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join(&self.storage.db_file)
    }

    /// Directory holding uploaded document blobs.
    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir().join(&self.storage.blob_dir)
    }

    /// Root against which relative chunk sources are resolved.
    pub fn source_root(&self) -> PathBuf {
        if self.index.source_root.is_empty() {
            self.blob_dir()
        } else {
            expand_home(&self.index.source_root)
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the database, snapshot and blobs.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// API server port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.docqa/data".to_string(),
            log_level: "info".to_string(),
            port: 8000,
        }
    }
}

/// Chunk index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Snapshot file name, relative to the data directory.
    pub snapshot_file: String,
    /// Root for resolving relative source identifiers. Empty means the blob
    /// directory.
    pub source_root: String,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            snapshot_file: "index.json".to_string(),
            source_root: String::new(),
            top_k: 3,
        }
    }
}

/// Document splitting settings, measured in characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

/// Streaming answer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Bound of the per-request token queue.
    pub token_queue_capacity: usize,
    /// Longest wait for the next token before a stream is abandoned.
    pub token_idle_timeout_secs: u64,
    /// Most recent turns fed back as memory. 0 keeps every turn.
    pub max_history_turns: usize,
    /// Maximum question length in characters.
    pub max_question_length: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            token_queue_capacity: 256,
            token_idle_timeout_secs: 120,
            max_history_turns: 0,
            max_question_length: 4000,
        }
    }
}

/// Relational and blob storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file name, relative to the data directory.
    pub db_file: String,
    /// Blob directory name, relative to the data directory.
    pub blob_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_file: "docqa.db".to_string(),
            blob_dir: "books".to_string(),
        }
    }
}
