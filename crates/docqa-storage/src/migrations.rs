//! Database schema migrations.
//!
//! Version 1 creates the document catalog and the conversation log tables.

use rusqlite::Connection;
use tracing::info;

use docqa_core::error::{DocqaError, Result};

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| DocqaError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| DocqaError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            id          TEXT PRIMARY KEY NOT NULL,
            file_name   TEXT NOT NULL,
            file_path   TEXT NOT NULL UNIQUE,
            state       TEXT NOT NULL DEFAULT 'uploaded'
                        CHECK (state IN ('uploaded', 'indexed', 'stale', 'deleted')),
            chunk_ids   TEXT NOT NULL DEFAULT '[]',
            is_deleted  INTEGER NOT NULL DEFAULT 0,
            created_at  INTEGER NOT NULL,
            updated_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_documents_state
            ON documents (state, created_at ASC);

        CREATE TABLE IF NOT EXISTS sessions (
            session_id  TEXT PRIMARY KEY NOT NULL,
            user_id     TEXT NOT NULL,
            title       TEXT NOT NULL,
            created_at  INTEGER NOT NULL,
            is_deleted  INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_user
            ON sessions (user_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS chat_history (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id  TEXT NOT NULL,
            user_id     TEXT NOT NULL,
            question    TEXT NOT NULL,
            answer      TEXT NOT NULL,
            created_at  INTEGER NOT NULL,
            FOREIGN KEY (session_id) REFERENCES sessions(session_id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_chat_history_session
            ON chat_history (session_id, user_id, id ASC);

        CREATE TABLE IF NOT EXISTS quotes (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_history_id INTEGER NOT NULL,
            position        INTEGER NOT NULL,
            content         TEXT NOT NULL,
            source          TEXT NOT NULL,
            page_number     INTEGER NOT NULL,
            FOREIGN KEY (chat_history_id) REFERENCES chat_history(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_quotes_history
            ON quotes (chat_history_id, position ASC);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| DocqaError::Storage(format!("Migration v1 failed: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn test_state_check_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO documents (id, file_name, file_path, state, created_at, updated_at)
             VALUES ('x', 'a', 'a', 'archived', 0, 0)",
            [],
        );
        assert!(result.is_err());
    }
}
