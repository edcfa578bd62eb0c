//! SQLite-backed document catalog.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use docqa_core::error::{DocqaError, Result};
use docqa_core::traits::DocumentCatalog;
use docqa_core::types::{ChunkId, DocumentState, SourceDocument};

use crate::db::Database;
use crate::timestamp_from_millis;

const DOCUMENT_COLUMNS: &str =
    "id, file_name, file_path, state, chunk_ids, is_deleted, created_at, updated_at";

/// Repository for uploaded documents and their index state.
pub struct DocumentRepository {
    db: Arc<Database>,
}

impl DocumentRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn query_documents(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<SourceDocument>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| DocqaError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(params, |row| Ok(row_to_document(row)))
                .map_err(|e| DocqaError::Storage(e.to_string()))?;

            let mut documents = Vec::new();
            for row in rows {
                let document = row.map_err(|e| DocqaError::Storage(e.to_string()))??;
                documents.push(document);
            }
            Ok(documents)
        })
    }

    fn query_one(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Option<SourceDocument>> {
        self.db.with_conn(|conn| {
            let result = conn
                .query_row(sql, params, |row| Ok(row_to_document(row)))
                .optional()
                .map_err(|e| DocqaError::Storage(e.to_string()))?;
            result.transpose()
        })
    }

    fn update(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<usize> {
        self.db.with_conn(|conn| {
            conn.execute(sql, params)
                .map_err(|e| DocqaError::Storage(format!("Failed to update document: {}", e)))
        })
    }
}

impl DocumentCatalog for DocumentRepository {
    fn insert(&self, document: &SourceDocument) -> Result<()> {
        let chunk_ids = serde_json::to_string(&document.chunk_ids)?;
        self.db.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO documents ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    DOCUMENT_COLUMNS
                ),
                rusqlite::params![
                    document.id.to_string(),
                    document.file_name,
                    document.file_path,
                    document.state.as_str(),
                    chunk_ids,
                    document.deleted as i32,
                    document.created_at.timestamp_millis(),
                    document.updated_at.timestamp_millis(),
                ],
            )
            .map_err(|e| DocqaError::Storage(format!("Failed to insert document: {}", e)))?;
            Ok(())
        })
    }

    fn get(&self, id: Uuid) -> Result<Option<SourceDocument>> {
        self.query_one(
            &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
            &[&id.to_string()],
        )
    }

    fn find_by_path(&self, file_path: &str) -> Result<Option<SourceDocument>> {
        self.query_one(
            &format!("SELECT {} FROM documents WHERE file_path = ?1", DOCUMENT_COLUMNS),
            &[&file_path],
        )
    }

    fn list(&self) -> Result<Vec<SourceDocument>> {
        self.query_documents(
            &format!(
                "SELECT {} FROM documents WHERE is_deleted = 0 ORDER BY created_at ASC, rowid ASC",
                DOCUMENT_COLUMNS
            ),
            &[],
        )
    }

    fn list_by_state(&self, state: DocumentState) -> Result<Vec<SourceDocument>> {
        self.query_documents(
            &format!(
                "SELECT {} FROM documents WHERE state = ?1 AND is_deleted = 0
                 ORDER BY created_at ASC, rowid ASC",
                DOCUMENT_COLUMNS
            ),
            &[&state.as_str()],
        )
    }

    fn list_pending(&self) -> Result<Vec<SourceDocument>> {
        self.query_documents(
            &format!(
                "SELECT {} FROM documents WHERE state IN ('uploaded', 'stale') AND is_deleted = 0
                 ORDER BY created_at ASC, rowid ASC",
                DOCUMENT_COLUMNS
            ),
            &[],
        )
    }

    fn list_deleted(&self) -> Result<Vec<SourceDocument>> {
        self.query_documents(
            &format!(
                "SELECT {} FROM documents WHERE is_deleted = 1 ORDER BY created_at ASC, rowid ASC",
                DOCUMENT_COLUMNS
            ),
            &[],
        )
    }

    fn mark_indexed(&self, id: Uuid, chunk_ids: &[ChunkId]) -> Result<()> {
        let chunk_ids = serde_json::to_string(chunk_ids)?;
        let changed = self.update(
            "UPDATE documents SET state = 'indexed', chunk_ids = ?2, updated_at = ?3
             WHERE id = ?1 AND is_deleted = 0",
            &[&id.to_string(), &chunk_ids, &Utc::now().timestamp_millis()],
        )?;
        if changed == 0 {
            return Err(DocqaError::NotFound(format!("document {}", id)));
        }
        Ok(())
    }

    fn mark_stale(&self, file_paths: &[String]) -> Result<usize> {
        if file_paths.is_empty() {
            return Ok(0);
        }
        let now = Utc::now().timestamp_millis();
        self.db.with_tx(|tx| {
            let mut stmt = tx
                .prepare(
                    "UPDATE documents SET state = 'stale', chunk_ids = '[]', updated_at = ?2
                     WHERE file_path = ?1 AND state = 'indexed' AND is_deleted = 0",
                )
                .map_err(|e| DocqaError::Storage(e.to_string()))?;
            let mut changed = 0;
            for path in file_paths {
                changed += stmt
                    .execute(rusqlite::params![path, now])
                    .map_err(|e| DocqaError::Storage(format!("Failed to mark stale: {}", e)))?;
            }
            Ok(changed)
        })
    }

    fn mark_deleted(&self, id: Uuid) -> Result<()> {
        let changed = self.update(
            "UPDATE documents SET state = 'deleted', is_deleted = 1, updated_at = ?2 WHERE id = ?1",
            &[&id.to_string(), &Utc::now().timestamp_millis()],
        )?;
        if changed == 0 {
            return Err(DocqaError::NotFound(format!("document {}", id)));
        }
        Ok(())
    }

    fn reset_uploaded(&self, id: Uuid) -> Result<()> {
        let changed = self.update(
            "UPDATE documents SET state = 'uploaded', chunk_ids = '[]', updated_at = ?2
             WHERE id = ?1 AND is_deleted = 0",
            &[&id.to_string(), &Utc::now().timestamp_millis()],
        )?;
        if changed == 0 {
            return Err(DocqaError::NotFound(format!("document {}", id)));
        }
        Ok(())
    }

    fn remove(&self, id: Uuid) -> Result<bool> {
        let changed = self.update("DELETE FROM documents WHERE id = ?1", &[&id.to_string()])?;
        Ok(changed > 0)
    }
}

fn row_to_document(row: &rusqlite::Row<'_>) -> Result<SourceDocument> {
    let id: String = row.get(0).map_err(|e| DocqaError::Storage(e.to_string()))?;
    let file_name: String = row.get(1).map_err(|e| DocqaError::Storage(e.to_string()))?;
    let file_path: String = row.get(2).map_err(|e| DocqaError::Storage(e.to_string()))?;
    let state: String = row.get(3).map_err(|e| DocqaError::Storage(e.to_string()))?;
    let chunk_ids: String = row.get(4).map_err(|e| DocqaError::Storage(e.to_string()))?;
    let deleted: i32 = row.get(5).map_err(|e| DocqaError::Storage(e.to_string()))?;
    let created_at: i64 = row.get(6).map_err(|e| DocqaError::Storage(e.to_string()))?;
    let updated_at: i64 = row.get(7).map_err(|e| DocqaError::Storage(e.to_string()))?;

    Ok(SourceDocument {
        id: Uuid::parse_str(&id).map_err(|e| DocqaError::Storage(format!("Invalid UUID: {}", e)))?,
        file_name,
        file_path,
        state: state.parse()?,
        chunk_ids: serde_json::from_str(&chunk_ids)?,
        deleted: deleted != 0,
        created_at: timestamp_from_millis(created_at)?,
        updated_at: timestamp_from_millis(updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> DocumentRepository {
        DocumentRepository::new(Arc::new(Database::in_memory().unwrap()))
    }

    #[test]
    fn test_insert_and_get() {
        let repo = repo();
        let doc = SourceDocument::new("a.pdf", "/books/a.pdf");
        repo.insert(&doc).unwrap();

        let loaded = repo.get(doc.id).unwrap().unwrap();
        assert_eq!(loaded.file_name, "a.pdf");
        assert_eq!(loaded.state, DocumentState::Uploaded);
        assert!(loaded.chunk_ids.is_empty());
        assert!(!loaded.deleted);

        let by_path = repo.find_by_path("/books/a.pdf").unwrap().unwrap();
        assert_eq!(by_path.id, doc.id);
        assert!(repo.get(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let repo = repo();
        repo.insert(&SourceDocument::new("a.pdf", "/books/a.pdf")).unwrap();
        let err = repo.insert(&SourceDocument::new("a.pdf", "/books/a.pdf"));
        assert!(matches!(err, Err(DocqaError::Storage(_))));
    }

    #[test]
    fn test_state_transitions() {
        let repo = repo();
        let doc = SourceDocument::new("a.pdf", "/books/a.pdf");
        repo.insert(&doc).unwrap();

        let chunk_ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        repo.mark_indexed(doc.id, &chunk_ids).unwrap();
        let loaded = repo.get(doc.id).unwrap().unwrap();
        assert_eq!(loaded.state, DocumentState::Indexed);
        assert_eq!(loaded.chunk_ids, chunk_ids);
        assert!(repo.list_pending().unwrap().is_empty());

        let changed = repo.mark_stale(&["/books/a.pdf".to_string()]).unwrap();
        assert_eq!(changed, 1);
        let loaded = repo.get(doc.id).unwrap().unwrap();
        assert_eq!(loaded.state, DocumentState::Stale);
        assert!(loaded.chunk_ids.is_empty());
        assert_eq!(repo.list_pending().unwrap().len(), 1);

        // Only Indexed rows flip.
        assert_eq!(repo.mark_stale(&["/books/a.pdf".to_string()]).unwrap(), 0);
    }

    #[test]
    fn test_list_pending_orders_oldest_first() {
        let repo = repo();
        let first = SourceDocument::new("a.pdf", "/books/a.pdf");
        let second = SourceDocument::new("b.pdf", "/books/b.pdf");
        let third = SourceDocument::new("c.pdf", "/books/c.pdf");
        repo.insert(&first).unwrap();
        repo.insert(&second).unwrap();
        repo.insert(&third).unwrap();
        repo.mark_indexed(second.id, &[Uuid::new_v4()]).unwrap();

        let pending: Vec<_> = repo.list_pending().unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(pending, vec![first.id, third.id]);
        assert_eq!(repo.list_by_state(DocumentState::Indexed).unwrap().len(), 1);
    }

    #[test]
    fn test_mark_deleted_hides_document() {
        let repo = repo();
        let doc = SourceDocument::new("a.pdf", "/books/a.pdf");
        repo.insert(&doc).unwrap();
        repo.mark_deleted(doc.id).unwrap();

        assert!(repo.list().unwrap().is_empty());
        assert!(repo.list_pending().unwrap().is_empty());
        let deleted = repo.list_deleted().unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].state, DocumentState::Deleted);

        assert!(repo.remove(doc.id).unwrap());
        assert!(!repo.remove(doc.id).unwrap());
        assert!(repo.list_deleted().unwrap().is_empty());
    }

    #[test]
    fn test_reset_uploaded() {
        let repo = repo();
        let doc = SourceDocument::new("a.pdf", "/books/a.pdf");
        repo.insert(&doc).unwrap();
        repo.mark_indexed(doc.id, &[Uuid::new_v4()]).unwrap();
        repo.reset_uploaded(doc.id).unwrap();

        let loaded = repo.get(doc.id).unwrap().unwrap();
        assert_eq!(loaded.state, DocumentState::Uploaded);
        assert!(loaded.chunk_ids.is_empty());
    }

    #[test]
    fn test_missing_document_errors() {
        let repo = repo();
        let id = Uuid::new_v4();
        assert!(matches!(repo.mark_indexed(id, &[]), Err(DocqaError::NotFound(_))));
        assert!(matches!(repo.mark_deleted(id), Err(DocqaError::NotFound(_))));
        assert!(matches!(repo.reset_uploaded(id), Err(DocqaError::NotFound(_))));
    }
}
