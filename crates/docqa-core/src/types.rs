use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DocqaError;

/// UTC timestamp used across the domain.
pub type Timestamp = DateTime<Utc>;

/// Identifier of a chunk, unique within one index snapshot.
pub type ChunkId = Uuid;

// =============================================================================
// Chunks
// =============================================================================

/// Provenance of a chunk within its source document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source identifier, matching `SourceDocument::file_path`.
    pub source: String,
    /// Zero-based page the chunk was cut from.
    pub page: u32,
    /// Zero-based position of the chunk within the document.
    pub ordinal: u32,
}

/// A chunk before it has been embedded and assigned an id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl NewChunk {
    pub fn new(content: impl Into<String>, source: impl Into<String>, page: u32, ordinal: u32) -> Self {
        Self {
            content: content.into(),
            metadata: ChunkMetadata {
                source: source.into(),
                page,
                ordinal,
            },
        }
    }
}

/// An embedded text fragment. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub embedding: Vec<f32>,
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// A snippet cited as supporting evidence for an answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitedSnippet {
    pub page_content: String,
    pub source: String,
    pub page: u32,
}

impl From<&Chunk> for CitedSnippet {
    fn from(chunk: &Chunk) -> Self {
        Self {
            page_content: chunk.content.clone(),
            source: chunk.metadata.source.clone(),
            page: chunk.metadata.page,
        }
    }
}

// =============================================================================
// Documents
// =============================================================================

/// Lifecycle state of a source document relative to the chunk index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    /// Stored, never indexed.
    Uploaded,
    /// All chunks present in the index.
    Indexed,
    /// Chunks removed from the index; eligible for re-ingest.
    Stale,
    /// Being removed; terminal.
    Deleted,
}

impl DocumentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentState::Uploaded => "uploaded",
            DocumentState::Indexed => "indexed",
            DocumentState::Stale => "stale",
            DocumentState::Deleted => "deleted",
        }
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentState {
    type Err = DocqaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(DocumentState::Uploaded),
            "indexed" => Ok(DocumentState::Indexed),
            "stale" => Ok(DocumentState::Stale),
            "deleted" => Ok(DocumentState::Deleted),
            other => Err(DocqaError::Serialization(format!(
                "unknown document state: {}",
                other
            ))),
        }
    }
}

/// A document tracked by the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: Uuid,
    pub file_name: String,
    /// Source identifier shared with `ChunkMetadata::source`.
    pub file_path: String,
    pub state: DocumentState,
    pub chunk_ids: Vec<ChunkId>,
    /// Set while removal is in progress; hides the row from ingest scans.
    pub deleted: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SourceDocument {
    pub fn new(file_name: impl Into<String>, file_path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            file_path: file_path.into(),
            state: DocumentState::Uploaded,
            chunk_ids: Vec::new(),
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the document is waiting to be (re)indexed.
    pub fn needs_indexing(&self) -> bool {
        !self.deleted && matches!(self.state, DocumentState::Uploaded | DocumentState::Stale)
    }
}

// =============================================================================
// Conversations
// =============================================================================

/// One persisted question/answer exchange.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub session_id: String,
    pub user_id: String,
    pub question: String,
    pub answer: String,
    pub sources: Vec<CitedSnippet>,
    pub created_at: Timestamp,
}

/// A question/answer pair fed back to the generator as memory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPair {
    pub question: String,
    pub answer: String,
}

impl From<&ConversationTurn> for HistoryPair {
    fn from(turn: &ConversationTurn) -> Self {
        Self {
            question: turn.question.clone(),
            answer: turn.answer.clone(),
        }
    }
}

/// Listing entry for a chat session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: Timestamp,
}

/// Title for a new session: the first 20 characters of its first question.
pub fn session_title(question: &str) -> String {
    const TITLE_CHARS: usize = 20;
    let mut chars = question.chars();
    let head: String = chars.by_ref().take(TITLE_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_state_roundtrip() {
        for state in [
            DocumentState::Uploaded,
            DocumentState::Indexed,
            DocumentState::Stale,
            DocumentState::Deleted,
        ] {
            assert_eq!(state.as_str().parse::<DocumentState>().unwrap(), state);
        }
        assert!("archived".parse::<DocumentState>().is_err());
    }

    #[test]
    fn test_document_state_serde() {
        let json = serde_json::to_string(&DocumentState::Stale).unwrap();
        assert_eq!(json, "\"stale\"");
    }

    #[test]
    fn test_needs_indexing() {
        let mut doc = SourceDocument::new("a.pdf", "/books/a.pdf");
        assert!(doc.needs_indexing());
        doc.state = DocumentState::Indexed;
        assert!(!doc.needs_indexing());
        doc.state = DocumentState::Stale;
        assert!(doc.needs_indexing());
        doc.deleted = true;
        assert!(!doc.needs_indexing());
    }

    #[test]
    fn test_session_title_truncates_on_chars() {
        assert_eq!(session_title("short"), "short");
        assert_eq!(session_title("exactly twenty chars"), "exactly twenty chars");
        assert_eq!(
            session_title("what does chapter three say about rust"),
            "what does chapter th..."
        );
        assert_eq!(session_title("ééééééééééééééééééééé"), "éééééééééééééééééééé...");
    }

    #[test]
    fn test_cited_snippet_from_chunk() {
        let chunk = Chunk {
            id: Uuid::new_v4(),
            embedding: vec![0.0; 4],
            content: "text".to_string(),
            metadata: ChunkMetadata {
                source: "/books/a.pdf".to_string(),
                page: 3,
                ordinal: 7,
            },
        };
        let snippet = CitedSnippet::from(&chunk);
        assert_eq!(snippet.page, 3);
        assert_eq!(snippet.source, "/books/a.pdf");
    }
}
