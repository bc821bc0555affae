//! vellum-retriever: Document question answering over cached embeddings
//!
//! This crate wires the vellum pipeline together: documents are split into
//! chunks, embedded once, and cached on disk; questions are answered by
//! ranking cached chunks against the question embedding and prompting a
//! generation provider with the winners. Every answered question is recorded
//! in a SQLite-backed query log that doubles as an answer cache.
//!
//! ## Key Modules
//!
//! - **[`engine`]**: The orchestrator tying stores, cache, and providers together
//! - **[`embedding_cache`]**: Content-addressed on-disk embedding artifacts
//! - **[`similarity`]**: Cosine top-K ranking of chunks against a question
//! - **[`storage`]**: SQLite document and query stores
//! - **[`prompt`]**: Prompt normalization and cache keys
//! - **[`error`]**: The [`RetrieveError`] taxonomy shared by all of the above
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use vellum_retriever::engine::{AskRequest, RetrievalEngine, RetrievalEngineConfig};
//! use vellum_embed::ProviderConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let (embedder, generator) = ProviderConfig::fixed().build()?;
//! let config = RetrievalEngineConfig::new(Path::new("./data").to_path_buf());
//! let engine = RetrievalEngine::new(config, embedder, generator).await?;
//!
//! let document = engine.ingest_file(Path::new("notes.txt")).await?;
//! let response = engine
//!     .ask(AskRequest {
//!         prompt: "What do the notes say about deadlines?".to_string(),
//!         document_id: document.id,
//!     })
//!     .await?;
//! println!("{}", response.answer);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Files → TextSplitter → EmbeddingProvider → EmbeddingCache (JSON artifacts)
//!                                                 ↓
//! Question → prompt cache → cosine top-K → GenerationProvider → QueryStore
//! ```

pub mod embedding_cache;
pub mod engine;
pub mod error;
pub mod prompt;
pub mod similarity;
pub mod storage;

pub use embedding_cache::{ChunkRecord, EmbeddingCache, EmbeddingSet};
pub use engine::{AskRequest, AskResponse, NO_ANSWER_SENTENCE, RetrievalEngine, RetrievalEngineConfig};
pub use error::{ProviderStage, Result, RetrieveError};
pub use similarity::{DEFAULT_TOP_K, ScoredChunk};
pub use storage::{Database, DocumentRecord, NewDocument, QueryFeedback, QueryRecord};
