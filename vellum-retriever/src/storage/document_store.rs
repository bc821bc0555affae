//! Typed access to the `documents` table.
//!
//! A document row moves through a small state machine: inserted (metadata
//! only), processed (embedding artifact linked via `embedding_doc_id`),
//! soft-deleted (hidden from listings, still fetchable by id), gone
//! (hard-deleted). [`DocumentStore::truncate`] resets the table wholesale,
//! including the id sequence.

use super::{DocumentRecord, NewDocument};
use crate::error::{Result, RetrieveError};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// Store handle for document rows. Cheap to clone.
#[derive(Clone, Debug)]
pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new document row and return it with its assigned id.
    ///
    /// The row starts unprocessed: `processed_at` and `embedding_doc_id` are
    /// NULL until [`mark_processed`](Self::mark_processed) runs.
    pub async fn insert(&self, new_document: NewDocument) -> Result<DocumentRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO documents (original_name, stored_file_name, file_path, file_size, mime_type, uploaded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&new_document.original_name)
        .bind(&new_document.stored_file_name)
        .bind(&new_document.file_path)
        .bind(new_document.file_size)
        .bind(&new_document.mime_type)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get(id)
            .await?
            .ok_or_else(|| RetrieveError::not_found("document", id.to_string()))
    }

    /// Fetch a document by id, regardless of its deletion state.
    pub async fn get(&self, id: i64) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query(
            "SELECT id, original_name, stored_file_name, file_path, file_size, mime_type, uploaded_at, processed_at, embedding_doc_id, total_embeddings, is_deleted FROM documents WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(record_from_row))
    }

    /// List all non-deleted documents, newest first.
    pub async fn list(&self) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query(
            "SELECT id, original_name, stored_file_name, file_path, file_size, mime_type, uploaded_at, processed_at, embedding_doc_id, total_embeddings, is_deleted FROM documents WHERE is_deleted = 0 ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    /// Record a completed processing run: stamps `processed_at`, links the
    /// embedding artifact, and stores the chunk count.
    pub async fn mark_processed(
        &self,
        id: i64,
        embedding_doc_id: &str,
        total_embeddings: i64,
    ) -> Result<DocumentRecord> {
        let result = sqlx::query(
            "UPDATE documents SET processed_at = ?1, embedding_doc_id = ?2, total_embeddings = ?3 WHERE id = ?4",
        )
        .bind(Utc::now())
        .bind(embedding_doc_id)
        .bind(total_embeddings)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RetrieveError::not_found("document", id.to_string()));
        }
        self.get(id)
            .await?
            .ok_or_else(|| RetrieveError::not_found("document", id.to_string()))
    }

    /// Soft-delete a document: it disappears from listings but stays
    /// fetchable by id.
    ///
    /// # Returns
    /// `true` if a live row was flagged, `false` if the row was missing or
    /// already soft-deleted.
    pub async fn soft_delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE documents SET is_deleted = 1 WHERE id = ?1 AND is_deleted = 0")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Hard-delete a document row in any state.
    ///
    /// # Returns
    /// `true` if a row was removed, `false` if none existed.
    pub async fn hard_delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove every document row and reset the id sequence, so the next
    /// insert gets id 1 again.
    pub async fn truncate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM documents").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM sqlite_sequence WHERE name = 'documents'")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

fn record_from_row(row: &SqliteRow) -> DocumentRecord {
    DocumentRecord {
        id: row.get("id"),
        original_name: row.get("original_name"),
        stored_file_name: row.get("stored_file_name"),
        file_path: row.get("file_path"),
        file_size: row.get("file_size"),
        mime_type: row.get("mime_type"),
        uploaded_at: row.get("uploaded_at"),
        processed_at: row.get("processed_at"),
        embedding_doc_id: row.get("embedding_doc_id"),
        total_embeddings: row.get("total_embeddings"),
        is_deleted: row.get("is_deleted"),
    }
}
