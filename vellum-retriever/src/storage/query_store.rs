//! Typed access to the `queries` table.
//!
//! Query rows are immutable once written except for the feedback flags and
//! the soft-deletion flag. [`QueryStore::find_by_prompt`] gives the engine
//! its de-duplication shortcut: equivalent prompts (same text up to case and
//! whitespace) resolve to the most recently answered live row.

use super::{QueryFeedback, QueryRecord};
use crate::error::{Result, RetrieveError};
use crate::prompt::normalize_prompt;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// How many rows [`QueryStore::recent`] returns at most. The history
/// listing is a bounded window, not a full log dump.
pub const RECENT_QUERY_LIMIT: usize = 10;

/// Store handle for query rows. Cheap to clone.
#[derive(Clone, Debug)]
pub struct QueryStore {
    pool: SqlitePool,
}

impl QueryStore {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an answered question and return the stored row.
    pub async fn insert(&self, prompt: &str, answer: &str) -> Result<QueryRecord> {
        let result = sqlx::query(
            "INSERT INTO queries (prompt, answer, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(prompt)
        .bind(answer)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get(id)
            .await?
            .ok_or_else(|| RetrieveError::not_found("query", id.to_string()))
    }

    /// Fetch a query by id, regardless of its deletion state.
    pub async fn get(&self, id: i64) -> Result<Option<QueryRecord>> {
        let row = sqlx::query(
            "SELECT id, prompt, answer, created_at, liked, disliked, is_deleted FROM queries WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(record_from_row))
    }

    /// List the most recent non-deleted queries, newest first, capped at
    /// [`RECENT_QUERY_LIMIT`] rows.
    pub async fn recent(&self) -> Result<Vec<QueryRecord>> {
        let rows = sqlx::query(
            "SELECT id, prompt, answer, created_at, liked, disliked, is_deleted FROM queries WHERE is_deleted = 0 ORDER BY id DESC LIMIT ?1",
        )
        .bind(RECENT_QUERY_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    /// Find the most recent non-deleted query whose prompt is equivalent to
    /// `prompt` under normalization (case and whitespace folded).
    pub async fn find_by_prompt(&self, prompt: &str) -> Result<Option<QueryRecord>> {
        let needle = normalize_prompt(prompt);
        if needle.is_empty() {
            return Ok(None);
        }

        // Normalization happens in Rust, so the scan walks stored rows
        // newest-first rather than matching in SQL.
        let rows = sqlx::query(
            "SELECT id, prompt, answer, created_at, liked, disliked, is_deleted FROM queries WHERE is_deleted = 0 ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        for row in &rows {
            let record = record_from_row(row);
            if normalize_prompt(&record.prompt) == needle {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Apply a partial feedback update.
    ///
    /// Each flag is overwritten only when supplied; a `None` leaves the
    /// stored value alone. Claiming liked and disliked together in one
    /// update is rejected as contradictory.
    pub async fn update_feedback(&self, id: i64, feedback: QueryFeedback) -> Result<QueryRecord> {
        if feedback.liked == Some(true) && feedback.disliked == Some(true) {
            return Err(RetrieveError::validation(
                "a query cannot be liked and disliked in the same update",
            ));
        }

        let result = sqlx::query(
            "UPDATE queries SET liked = COALESCE(?1, liked), disliked = COALESCE(?2, disliked) WHERE id = ?3",
        )
        .bind(feedback.liked)
        .bind(feedback.disliked)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RetrieveError::not_found("query", id.to_string()));
        }
        self.get(id)
            .await?
            .ok_or_else(|| RetrieveError::not_found("query", id.to_string()))
    }

    /// Soft-delete a query: it disappears from listings and from
    /// [`find_by_prompt`](Self::find_by_prompt), but stays fetchable by id.
    ///
    /// # Returns
    /// `true` if a live row was flagged, `false` if the row was missing or
    /// already soft-deleted.
    pub async fn soft_delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE queries SET is_deleted = 1 WHERE id = ?1 AND is_deleted = 0")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Hard-delete a query row in any state.
    ///
    /// # Returns
    /// `true` if a row was removed, `false` if none existed.
    pub async fn hard_delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM queries WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove every query row and reset the id sequence.
    pub async fn truncate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM queries").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM sqlite_sequence WHERE name = 'queries'")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

fn record_from_row(row: &SqliteRow) -> QueryRecord {
    QueryRecord {
        id: row.get("id"),
        prompt: row.get("prompt"),
        answer: row.get("answer"),
        created_at: row.get("created_at"),
        liked: row.get("liked"),
        disliked: row.get("disliked"),
        is_deleted: row.get("is_deleted"),
    }
}
