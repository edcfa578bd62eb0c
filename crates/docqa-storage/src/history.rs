//! SQLite-backed conversation log.
//!
//! A turn is one `chat_history` row plus its cited `quotes`. Sessions are
//! created implicitly by the first turn and carry a title derived from its
//! question.

use std::sync::Arc;

use docqa_core::error::{DocqaError, Result};
use docqa_core::traits::HistoryStore;
use docqa_core::types::{session_title, CitedSnippet, ConversationTurn, SessionSummary};

use crate::db::Database;
use crate::timestamp_from_millis;

/// Repository for chat sessions, turns and quotes.
pub struct HistoryRepository {
    db: Arc<Database>,
}

impl HistoryRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl HistoryStore for HistoryRepository {
    fn append(&self, turn: &ConversationTurn) -> Result<()> {
        let created_at = turn.created_at.timestamp_millis();
        self.db.with_tx(|tx| {
            tx.execute(
                "INSERT OR IGNORE INTO sessions (session_id, user_id, title, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    turn.session_id,
                    turn.user_id,
                    session_title(&turn.question),
                    created_at,
                ],
            )
            .map_err(|e| DocqaError::Storage(format!("Failed to create session: {}", e)))?;

            tx.execute(
                "INSERT INTO chat_history (session_id, user_id, question, answer, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    turn.session_id,
                    turn.user_id,
                    turn.question,
                    turn.answer,
                    created_at,
                ],
            )
            .map_err(|e| DocqaError::Storage(format!("Failed to save turn: {}", e)))?;
            let history_id = tx.last_insert_rowid();

            let mut stmt = tx
                .prepare(
                    "INSERT INTO quotes (chat_history_id, position, content, source, page_number)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(|e| DocqaError::Storage(e.to_string()))?;
            for (position, quote) in turn.sources.iter().enumerate() {
                stmt.execute(rusqlite::params![
                    history_id,
                    position as i64,
                    quote.page_content,
                    quote.source,
                    quote.page,
                ])
                .map_err(|e| DocqaError::Storage(format!("Failed to save quote: {}", e)))?;
            }
            Ok(())
        })
    }

    fn turns(&self, session_id: &str, user_id: &str) -> Result<Vec<ConversationTurn>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT h.id, h.question, h.answer, h.created_at
                     FROM chat_history h
                     JOIN sessions s ON s.session_id = h.session_id
                     WHERE h.session_id = ?1 AND h.user_id = ?2 AND s.is_deleted = 0
                     ORDER BY h.id ASC",
                )
                .map_err(|e| DocqaError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params![session_id, user_id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                })
                .map_err(|e| DocqaError::Storage(e.to_string()))?;

            let mut quotes_stmt = conn
                .prepare(
                    "SELECT content, source, page_number FROM quotes
                     WHERE chat_history_id = ?1 ORDER BY position ASC",
                )
                .map_err(|e| DocqaError::Storage(e.to_string()))?;

            let mut turns = Vec::new();
            for row in rows {
                let (id, question, answer, created_at) =
                    row.map_err(|e| DocqaError::Storage(e.to_string()))?;
                let sources = quotes_stmt
                    .query_map(rusqlite::params![id], |q| {
                        Ok(CitedSnippet {
                            page_content: q.get(0)?,
                            source: q.get(1)?,
                            page: q.get(2)?,
                        })
                    })
                    .map_err(|e| DocqaError::Storage(e.to_string()))?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(|e| DocqaError::Storage(e.to_string()))?;

                turns.push(ConversationTurn {
                    session_id: session_id.to_string(),
                    user_id: user_id.to_string(),
                    question,
                    answer,
                    sources,
                    created_at: timestamp_from_millis(created_at)?,
                });
            }
            Ok(turns)
        })
    }

    fn sessions(&self, user_id: &str) -> Result<Vec<SessionSummary>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT session_id, title, created_at FROM sessions
                     WHERE user_id = ?1 AND is_deleted = 0
                     ORDER BY created_at DESC, rowid DESC",
                )
                .map_err(|e| DocqaError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params![user_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })
                .map_err(|e| DocqaError::Storage(e.to_string()))?;

            let mut sessions = Vec::new();
            for row in rows {
                let (session_id, title, created_at) =
                    row.map_err(|e| DocqaError::Storage(e.to_string()))?;
                sessions.push(SessionSummary {
                    session_id,
                    user_id: user_id.to_string(),
                    title,
                    created_at: timestamp_from_millis(created_at)?,
                });
            }
            Ok(sessions)
        })
    }

    fn delete_session(&self, session_id: &str, user_id: &str) -> Result<bool> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE sessions SET is_deleted = 1
                     WHERE session_id = ?1 AND user_id = ?2 AND is_deleted = 0",
                    rusqlite::params![session_id, user_id],
                )
                .map_err(|e| DocqaError::Storage(format!("Failed to delete session: {}", e)))?;
            Ok(changed > 0)
        })
    }
}
