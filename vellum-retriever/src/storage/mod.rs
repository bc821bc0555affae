//! Durable document and query stores backed by SQLite.
//!
//! This module provides the relational half of the pipeline's state,
//! managing:
//! - **Documents**: upload metadata, processing state, and the link into the
//!   embedding cache
//! - **Queries**: the question/answer log with per-row feedback flags
//!
//! Embedding vectors themselves never live here; they are file artifacts
//! owned by [`embedding_cache`](crate::embedding_cache). A document row
//! points at its artifact through `embedding_doc_id`.
//!
//! ## Key Components
//!
//! - [`Database`]: owns the connection pool and creates the schema on open
//! - [`DocumentStore`]: typed access to the `documents` table
//! - [`QueryStore`]: typed access to the `queries` table
//!
//! ## Database Schema
//!
//! ```sql
//! CREATE TABLE documents (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     original_name TEXT NOT NULL,        -- name the file was uploaded under
//!     stored_file_name TEXT NOT NULL,     -- name of the copy we read from
//!     file_path TEXT NOT NULL,            -- where that copy lives
//!     file_size INTEGER NOT NULL,         -- size in bytes
//!     mime_type TEXT NOT NULL,
//!     uploaded_at TIMESTAMP NOT NULL,
//!     processed_at TIMESTAMP,             -- NULL until embeddings exist
//!     embedding_doc_id TEXT,              -- cache fingerprint, NULL until processed
//!     total_embeddings INTEGER NOT NULL DEFAULT 0,
//!     is_deleted INTEGER NOT NULL DEFAULT 0
//! );
//!
//! CREATE TABLE queries (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     prompt TEXT NOT NULL,
//!     answer TEXT NOT NULL,
//!     created_at TIMESTAMP NOT NULL,
//!     liked INTEGER NOT NULL DEFAULT 0,
//!     disliked INTEGER NOT NULL DEFAULT 0,
//!     is_deleted INTEGER NOT NULL DEFAULT 0
//! );
//! ```
//!
//! Soft deletion flips `is_deleted`; the row stays retrievable by id but
//! drops out of listings. Hard deletion removes the row. Truncation empties
//! a table and resets its id sequence, so a fresh corpus starts at id 1.
//!
//! ## SQLite Optimizations
//!
//! - WAL journal mode for concurrent read/write access
//! - 64KB page size for better I/O performance
//! - Full auto-vacuum to reclaim space automatically
//! - 5 second busy timeout so concurrent writers queue instead of failing

pub mod document_store;
pub mod query_store;

pub use document_store::DocumentStore;
pub use query_store::{QueryStore, RECENT_QUERY_LIMIT};

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::path::Path;
use std::time::Duration;

/// Database file created under the base directory.
pub const DATABASE_FILE: &str = "vellum.db";

/// A document row: upload metadata plus processing state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord {
    /// Auto-assigned row id
    pub id: i64,
    /// Name the file was uploaded under
    pub original_name: String,
    /// Name of the stored copy the pipeline reads from
    pub stored_file_name: String,
    /// Filesystem path of the stored copy
    pub file_path: String,
    /// Size of the stored copy in bytes
    pub file_size: i64,
    /// Declared content type
    pub mime_type: String,
    /// When the row was inserted
    pub uploaded_at: DateTime<Utc>,
    /// When embeddings were last produced, if ever
    pub processed_at: Option<DateTime<Utc>>,
    /// Fingerprint of the embedding artifact in the cache, once processed
    pub embedding_doc_id: Option<String>,
    /// Number of chunk embeddings in the artifact
    pub total_embeddings: i64,
    /// Soft-deletion flag; hidden from listings when set
    pub is_deleted: bool,
}

/// Payload for inserting a new document row.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub original_name: String,
    pub stored_file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
}

/// A query row: one asked-and-answered question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRecord {
    /// Auto-assigned row id
    pub id: i64,
    /// The question as asked
    pub prompt: String,
    /// The answer that was returned
    pub answer: String,
    /// When the row was inserted
    pub created_at: DateTime<Utc>,
    /// Positive feedback flag
    pub liked: bool,
    /// Negative feedback flag
    pub disliked: bool,
    /// Soft-deletion flag; hidden from listings when set
    pub is_deleted: bool,
}

/// Partial feedback update for a query row.
///
/// Fields left as `None` keep their stored value, so a caller can flip one
/// flag without knowing the other.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryFeedback {
    pub liked: Option<bool>,
    pub disliked: Option<bool>,
}

/// Handle to the SQLite database.
///
/// Opening creates the schema if needed. The handle is cheap to clone; all
/// clones share one connection pool.
///
/// # Example
///
/// ```no_run
/// use vellum_retriever::storage::Database;
/// use std::path::Path;
///
/// # async fn example() -> vellum_retriever::error::Result<()> {
/// let db = Database::open(Path::new("./data")).await?;
/// let documents = db.documents().list().await?;
/// println!("{} documents", documents.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if necessary) the database under the given base
    /// directory.
    pub async fn open(base: &Path) -> Result<Self> {
        std::fs::create_dir_all(base)?;
        let db_path = base.join(DATABASE_FILE);

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true)
            .create_if_missing(true)
            .auto_vacuum(sqlx::sqlite::SqliteAutoVacuum::Full)
            .page_size(1 << 16)
            .optimize_on_close(true, 1 << 10);

        let pool = SqlitePool::connect_with(options).await?;
        Self::new_with_pool(pool).await
    }

    /// Open an in-memory database. Used by tests; the data vanishes when the
    /// pool is dropped.
    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePool::connect("sqlite::memory:").await?;
        Self::new_with_pool(pool).await
    }

    async fn new_with_pool(pool: SqlitePool) -> Result<Self> {
        Self::create_tables(&pool).await?;
        Ok(Self { pool })
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                original_name TEXT NOT NULL,
                stored_file_name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                mime_type TEXT NOT NULL,
                uploaded_at TIMESTAMP NOT NULL,
                processed_at TIMESTAMP,
                embedding_doc_id TEXT,
                total_embeddings INTEGER NOT NULL DEFAULT 0,
                is_deleted INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS queries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                prompt TEXT NOT NULL,
                answer TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL,
                liked INTEGER NOT NULL DEFAULT 0,
                disliked INTEGER NOT NULL DEFAULT 0,
                is_deleted INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_is_deleted ON documents(is_deleted)",
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_queries_is_deleted ON queries(is_deleted)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Typed access to the `documents` table.
    pub fn documents(&self) -> DocumentStore {
        DocumentStore::new(self.pool.clone())
    }

    /// Typed access to the `queries` table.
    pub fn queries(&self) -> QueryStore {
        QueryStore::new(self.pool.clone())
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the connection pool, flushing WAL state.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
