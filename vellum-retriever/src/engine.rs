//! High-level retrieval engine orchestrating the question answering pipeline.
//!
//! This module coordinates the full path from raw documents to grounded
//! answers: splitting text into chunks, embedding them, caching the vectors,
//! ranking chunks against a question, and prompting a generation provider
//! with the winners.
//!
//! ## Pipeline Flow
//!
//! ```text
//! ingest:  file → DocumentStore → TextSplitter → EmbeddingProvider → EmbeddingCache
//! ask:     prompt → QueryStore (de-dup) → prompt embedding → top-K chunks
//!                 → GenerationProvider → QueryStore (persist) → answer
//! ```
//!
//! ## Caching Behavior
//!
//! Every expensive step is skipped when its result is already known:
//! - A document whose fingerprint (name + size) has a cached artifact is
//!   re-linked without reading the file or calling the embedding provider.
//! - A prompt equivalent to an already-answered one (case and whitespace
//!   folded) is served straight from the query log.
//! - A prompt embedding, once computed, is reused across questions.

use crate::embedding_cache::{CACHE_DIR, EmbeddingCache, EmbeddingSet};
use crate::error::{Result, RetrieveError};
use crate::similarity::{self, DEFAULT_TOP_K, ScoredChunk};
use crate::storage::{Database, DocumentRecord, NewDocument};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use vellum_chunk::{DEFAULT_MAX_CHUNK_SIZE, TextSplitter};
use vellum_embed::{EmbeddingProvider, GenerationProvider};

/// The sentence the generation provider is instructed to reply with when the
/// retrieved context does not contain the answer.
pub const NO_ANSWER_SENTENCE: &str = "The answer was not found in the provided documents.";

/// Configuration for the retrieval engine
#[derive(Debug, Clone)]
pub struct RetrievalEngineConfig {
    /// Directory holding the database file and the embedding cache
    pub base_dir: PathBuf,
    /// Maximum chunk size in bytes for document splitting
    pub max_chunk_size: usize,
    /// How many chunks to hand the generation provider as context
    pub top_k: usize,
}

impl RetrievalEngineConfig {
    /// Create a configuration with default chunking and ranking settings.
    ///
    /// # Arguments
    /// * `base_dir` - Directory for the database file and embedding cache
    ///
    /// # Example
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Set the maximum chunk size in bytes.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn with_max_chunk_size(mut self, size: usize) -> Self {
        self.max_chunk_size = size;
        self
    }

    /// Set how many chunks are selected as context per question.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

/// A question addressed at one ingested document.
#[derive(Debug, Clone)]
pub struct AskRequest {
    /// The question text
    pub prompt: String,
    /// Id of the document to answer from
    pub document_id: i64,
}

/// The outcome of [`RetrievalEngine::ask`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskResponse {
    /// The generated (or replayed) answer
    pub answer: String,
    /// Id of the query row backing this answer
    pub query_id: i64,
    /// True when the answer was replayed from the query log instead of
    /// generated fresh
    pub cached: bool,
}

/// The main orchestrator: wires stores, cache, splitter, and providers into
/// the ingest and ask operations.
pub struct RetrievalEngine {
    config: RetrievalEngineConfig,
    database: Database,
    cache: EmbeddingCache,
    splitter: TextSplitter,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
}

impl std::fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("config", &self.config)
            .field("embedder", &self.embedder.provider_name())
            .field("generator", &self.generator.provider_name())
            .finish()
    }
}

impl RetrievalEngine {
    /// Create an engine backed by a persistent database under
    /// `config.base_dir`.
    ///
    /// # Arguments
    /// * `config` - Paths and pipeline settings
    /// * `embedder` - Provider used for chunk and prompt embeddings
    /// * `generator` - Provider used to produce answers
    pub async fn new(
        config: RetrievalEngineConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
    ) -> Result<Self> {
        Self::new_impl(config, embedder, generator, false).await
    }

    /// Create an engine with an in-memory database. Intended for tests; the
    /// embedding cache still lives under `config.base_dir`.
    pub async fn new_memory(
        config: RetrievalEngineConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
    ) -> Result<Self> {
        Self::new_impl(config, embedder, generator, true).await
    }

    async fn new_impl(
        config: RetrievalEngineConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        in_memory: bool,
    ) -> Result<Self> {
        let database = if in_memory {
            Database::open_memory().await?
        } else {
            Database::open(&config.base_dir).await?
        };
        let cache = EmbeddingCache::open(config.base_dir.join(CACHE_DIR))?;
        let splitter = TextSplitter::new(config.max_chunk_size);

        Ok(Self {
            config,
            database,
            cache,
            splitter,
            embedder,
            generator,
        })
    }

    /// Get the underlying database handle.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Get the underlying embedding cache handle.
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &RetrievalEngineConfig {
        &self.config
    }

    /// Register a file as a document and process it into embeddings.
    ///
    /// The file stays where it is; only its path and metadata are recorded.
    pub async fn ingest_file(&self, path: &Path) -> Result<DocumentRecord> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(RetrieveError::validation(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        let original_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                RetrieveError::validation(format!("{} has no usable file name", path.display()))
            })?;

        let document = self
            .database
            .documents()
            .insert(NewDocument {
                original_name: original_name.clone(),
                stored_file_name: original_name,
                file_path: path.to_string_lossy().into_owned(),
                file_size: metadata.len() as i64,
                mime_type: mime_type_for(path).to_string(),
            })
            .await?;

        info!(
            "Ingested {} as document {}",
            document.original_name, document.id
        );
        self.process_document(document.id).await
    }

    /// Chunk and embed a document, publish the artifact to the cache, and
    /// mark the row processed.
    ///
    /// Processing is idempotent: when an artifact already exists for the
    /// document's fingerprint, it is re-linked without reading the file or
    /// calling the embedding provider.
    pub async fn process_document(&self, document_id: i64) -> Result<DocumentRecord> {
        let documents = self.database.documents();
        let document = documents
            .get(document_id)
            .await?
            .ok_or_else(|| RetrieveError::not_found("document", document_id.to_string()))?;

        let embedding_doc_id =
            EmbeddingCache::fingerprint(&document.original_name, document.file_size as u64);

        if let Some(set) = self.cache.load(&embedding_doc_id).await? {
            info!(
                "Document {} already has artifact {}, skipping embedding",
                document_id, embedding_doc_id
            );
            return documents
                .mark_processed(document_id, &embedding_doc_id, set.chunks.len() as i64)
                .await;
        }

        let text = tokio::fs::read_to_string(&document.file_path).await?;
        let texts: Vec<String> = self
            .splitter
            .split(&text)
            .into_iter()
            .map(|chunk| chunk.text)
            .collect();

        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder
                .embed_batch(&texts)
                .await
                .map_err(RetrieveError::embedding)?
        };

        let set = self.cache.save(&embedding_doc_id, &texts, &vectors).await?;
        info!(
            "Embedded document {} into {} chunks as {}",
            document_id,
            set.chunks.len(),
            embedding_doc_id
        );
        documents
            .mark_processed(document_id, &embedding_doc_id, set.chunks.len() as i64)
            .await
    }

    /// Answer a question from one document's content.
    ///
    /// Equivalent prompts (same text up to case and whitespace) are answered
    /// from the query log without touching either provider; the response is
    /// marked `cached` in that case.
    pub async fn ask(&self, request: AskRequest) -> Result<AskResponse> {
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return Err(RetrieveError::validation("prompt must not be empty"));
        }

        if let Some(existing) = self.database.queries().find_by_prompt(prompt).await? {
            info!("Replaying answer from query {}", existing.id);
            return Ok(AskResponse {
                answer: existing.answer,
                query_id: existing.id,
                cached: true,
            });
        }

        // Resolve the document before spending anything on providers.
        let set = self.resolve_embedding_set(request.document_id).await?;

        let query_vector = self.prompt_embedding(prompt).await?;
        let ranked = similarity::top_k(&query_vector, &set.chunks, self.config.top_k)?;
        debug!("Selected {} context chunks", ranked.len());

        let assembled = assemble_prompt(prompt, &ranked);
        let answer = self
            .generator
            .generate(&assembled)
            .await
            .map_err(RetrieveError::generation)?;

        let record = self.database.queries().insert(prompt, &answer).await?;
        info!(
            "Answered query {} using {} context chunks",
            record.id,
            ranked.len()
        );
        Ok(AskResponse {
            answer: record.answer,
            query_id: record.id,
            cached: false,
        })
    }

    /// Resolve a document reference to its cached embedding set.
    async fn resolve_embedding_set(&self, document_id: i64) -> Result<EmbeddingSet> {
        let document = self
            .database
            .documents()
            .get(document_id)
            .await?
            .filter(|d| !d.is_deleted)
            .ok_or_else(|| {
                RetrieveError::validation(format!("document {document_id} does not exist"))
            })?;

        let embedding_doc_id = document.embedding_doc_id.as_deref().ok_or_else(|| {
            RetrieveError::not_found(
                "embedding set",
                format!("document {document_id} has not been processed"),
            )
        })?;

        self.cache
            .load(embedding_doc_id)
            .await?
            .ok_or_else(|| RetrieveError::not_found("embedding set", embedding_doc_id.to_string()))
    }

    /// Fetch or compute the embedding for a prompt, keyed by its normalized
    /// form.
    async fn prompt_embedding(&self, prompt: &str) -> Result<Vec<f32>> {
        if let Some(vector) = self.cache.get_prompt_embedding(prompt).await? {
            debug!("Prompt embedding served from cache");
            return Ok(vector);
        }

        let vector = self
            .embedder
            .embed(prompt)
            .await
            .map_err(RetrieveError::embedding)?;
        self.cache
            .put_prompt_embedding(prompt, vector.clone())
            .await?;
        Ok(vector)
    }
}

/// Assemble the generation prompt: a fixed instruction, the ranked context
/// chunks fenced by `---` lines, and the user's question.
fn assemble_prompt(question: &str, context: &[ScoredChunk]) -> String {
    let mut sections = String::new();
    for chunk in context {
        sections.push_str("---\n");
        sections.push_str(&chunk.text);
        sections.push('\n');
    }
    sections.push_str("---");

    format!(
        "Answer the question using only the context below. If the context does not contain the answer, reply exactly: \"{NO_ANSWER_SENTENCE}\"\n\nContext:\n{sections}\n\nQuestion: {question}"
    )
}

/// Guess a MIME type from the file extension.
fn mime_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("txt") => "text/plain",
        Some("md") | Some("markdown") => "text/markdown",
        Some("json") => "application/json",
        Some("csv") => "text/csv",
        Some("html") | Some("htm") => "text/html",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;
    use vellum_embed::{EmbedError, FixedEmbeddingProvider, FixedGenerationProvider};

    async fn test_engine() -> Result<(
        RetrievalEngine,
        Arc<FixedEmbeddingProvider>,
        Arc<FixedGenerationProvider>,
        tempfile::TempDir,
    )> {
        let temp_dir = tempfile::tempdir()?;
        let embedder = Arc::new(FixedEmbeddingProvider::new(8));
        let generator = Arc::new(FixedGenerationProvider::new("canned answer"));
        let config = RetrievalEngineConfig::new(temp_dir.path().to_path_buf());
        let engine =
            RetrievalEngine::new_memory(config, embedder.clone(), generator.clone()).await?;
        Ok((engine, embedder, generator, temp_dir))
    }

    async fn write_sample(dir: &Path, name: &str, text: &str) -> Result<PathBuf> {
        let path = dir.join(name);
        tokio::fs::write(&path, text).await?;
        Ok(path)
    }

    struct FailingGenerationProvider {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl GenerationProvider for FailingGenerationProvider {
        async fn generate(&self, _prompt: &str) -> vellum_embed::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(EmbedError::Timeout { seconds: 1 })
        }

        fn provider_name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_ingest_file_processes_into_embeddings() -> Result<()> {
        let (engine, embedder, _generator, temp_dir) = test_engine().await?;
        let path = write_sample(
            temp_dir.path(),
            "facts.txt",
            "The sky is blue. Water is wet. Rust has a borrow checker.",
        )
        .await?;

        let document = engine.ingest_file(&path).await?;

        assert!(document.processed_at.is_some());
        assert!(document.embedding_doc_id.is_some());
        assert!(document.total_embeddings > 0);
        assert_eq!(document.mime_type, "text/plain");
        assert_eq!(embedder.call_count(), 1);

        let ids = engine.cache().list().await?;
        assert_eq!(ids, vec![document.embedding_doc_id.unwrap()]);
        Ok(())
    }

    #[traced_test]
    #[tokio::test]
    async fn test_reprocessing_skips_the_embedding_provider() -> Result<()> {
        let (engine, embedder, _generator, temp_dir) = test_engine().await?;
        let path = write_sample(temp_dir.path(), "facts.txt", "The sky is blue.").await?;

        let document = engine.ingest_file(&path).await?;
        let calls_after_first = embedder.call_count();

        let again = engine.process_document(document.id).await?;
        assert_eq!(embedder.call_count(), calls_after_first);
        assert_eq!(again.embedding_doc_id, document.embedding_doc_id);
        Ok(())
    }

    #[tokio::test]
    async fn test_documents_with_same_identity_share_one_artifact() -> Result<()> {
        let (engine, embedder, _generator, temp_dir) = test_engine().await?;
        let path = write_sample(temp_dir.path(), "facts.txt", "The sky is blue.").await?;

        let first = engine.ingest_file(&path).await?;
        let second = engine.ingest_file(&path).await?;

        assert_ne!(first.id, second.id);
        assert_eq!(first.embedding_doc_id, second.embedding_doc_id);
        assert_eq!(embedder.call_count(), 1);
        assert_eq!(engine.cache().list().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_ask_generates_and_persists_an_answer() -> Result<()> {
        let (engine, _embedder, generator, temp_dir) = test_engine().await?;
        let path = write_sample(temp_dir.path(), "facts.txt", "The sky is blue.").await?;
        let document = engine.ingest_file(&path).await?;

        let response = engine
            .ask(AskRequest {
                prompt: "What color is the sky?".to_string(),
                document_id: document.id,
            })
            .await?;

        assert_eq!(response.answer, "canned answer");
        assert!(!response.cached);
        assert_eq!(generator.call_count(), 1);

        let stored = engine.database().queries().get(response.query_id).await?;
        assert_eq!(stored.map(|q| q.answer), Some("canned answer".to_string()));

        // The generation prompt carries the context and the question.
        let prompts = generator.prompts();
        assert!(prompts[0].contains("The sky is blue"));
        assert!(prompts[0].contains("What color is the sky?"));
        assert!(prompts[0].contains(NO_ANSWER_SENTENCE));
        Ok(())
    }

    #[traced_test]
    #[tokio::test]
    async fn test_equivalent_prompt_replays_without_providers() -> Result<()> {
        let (engine, embedder, generator, temp_dir) = test_engine().await?;
        let path = write_sample(temp_dir.path(), "facts.txt", "The sky is blue.").await?;
        let document = engine.ingest_file(&path).await?;

        let first = engine
            .ask(AskRequest {
                prompt: "What color is the sky?".to_string(),
                document_id: document.id,
            })
            .await?;

        let embed_calls = embedder.call_count();
        let generate_calls = generator.call_count();

        let second = engine
            .ask(AskRequest {
                prompt: "  what COLOR is the sky?  ".to_string(),
                document_id: document.id,
            })
            .await?;

        assert!(second.cached);
        assert_eq!(second.query_id, first.query_id);
        assert_eq!(second.answer, first.answer);
        assert_eq!(embedder.call_count(), embed_calls);
        assert_eq!(generator.call_count(), generate_calls);
        Ok(())
    }

    #[tokio::test]
    async fn test_blank_prompt_is_rejected() -> Result<()> {
        let (engine, embedder, generator, _temp_dir) = test_engine().await?;

        for prompt in ["", "   ", "\n\t"] {
            let result = engine
                .ask(AskRequest {
                    prompt: prompt.to_string(),
                    document_id: 1,
                })
                .await;
            assert!(matches!(result, Err(RetrieveError::Validation { .. })));
        }
        assert_eq!(embedder.call_count(), 0);
        assert_eq!(generator.call_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_document_fails_before_any_provider_call() -> Result<()> {
        let (engine, embedder, generator, _temp_dir) = test_engine().await?;

        let result = engine
            .ask(AskRequest {
                prompt: "anything".to_string(),
                document_id: 99,
            })
            .await;

        assert!(matches!(result, Err(RetrieveError::Validation { .. })));
        assert_eq!(embedder.call_count(), 0);
        assert_eq!(generator.call_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_unprocessed_document_is_missing_its_embedding_set() -> Result<()> {
        let (engine, embedder, generator, _temp_dir) = test_engine().await?;

        let document = engine
            .database()
            .documents()
            .insert(NewDocument {
                original_name: "pending.txt".into(),
                stored_file_name: "pending.txt".into(),
                file_path: "/tmp/pending.txt".into(),
                file_size: 10,
                mime_type: "text/plain".into(),
            })
            .await?;

        let result = engine
            .ask(AskRequest {
                prompt: "anything".to_string(),
                document_id: document.id,
            })
            .await;

        assert!(matches!(result, Err(RetrieveError::NotFound { .. })));
        assert_eq!(embedder.call_count(), 0);
        assert_eq!(generator.call_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_reasked_prompt_reuses_its_cached_embedding() -> Result<()> {
        let (engine, embedder, generator, temp_dir) = test_engine().await?;
        let path = write_sample(temp_dir.path(), "facts.txt", "The sky is blue.").await?;
        let document = engine.ingest_file(&path).await?;

        let first = engine
            .ask(AskRequest {
                prompt: "What color is the sky?".to_string(),
                document_id: document.id,
            })
            .await?;

        // Remove the history row so the next ask cannot be replayed.
        engine.database().queries().soft_delete(first.query_id).await?;
        let embed_calls = embedder.call_count();

        let second = engine
            .ask(AskRequest {
                prompt: "What color is the sky?".to_string(),
                document_id: document.id,
            })
            .await?;

        // Fresh generation, but the prompt embedding came from the cache.
        assert!(!second.cached);
        assert_ne!(second.query_id, first.query_id);
        assert_eq!(embedder.call_count(), embed_calls);
        assert_eq!(generator.call_count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_generation_persists_nothing() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let embedder = Arc::new(FixedEmbeddingProvider::new(8));
        let generator = Arc::new(FailingGenerationProvider {
            calls: AtomicUsize::new(0),
        });
        let config = RetrievalEngineConfig::new(temp_dir.path().to_path_buf());
        let engine =
            RetrievalEngine::new_memory(config, embedder.clone(), generator.clone()).await?;

        let path = write_sample(temp_dir.path(), "facts.txt", "The sky is blue.").await?;
        let document = engine.ingest_file(&path).await?;

        let result = engine
            .ask(AskRequest {
                prompt: "What color is the sky?".to_string(),
                document_id: document.id,
            })
            .await;

        match result {
            Err(RetrieveError::Provider { stage, .. }) => {
                assert_eq!(stage, crate::error::ProviderStage::Generation);
            }
            other => panic!("expected a generation provider error, got {other:?}"),
        }

        // No query row was written, so a retry generates again.
        assert!(engine.database().queries().recent().await?.is_empty());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_document_is_still_askable() -> Result<()> {
        let (engine, _embedder, generator, temp_dir) = test_engine().await?;
        let path = write_sample(temp_dir.path(), "empty.txt", "").await?;

        let document = engine.ingest_file(&path).await?;
        assert_eq!(document.total_embeddings, 0);

        let response = engine
            .ask(AskRequest {
                prompt: "Is there anything here?".to_string(),
                document_id: document.id,
            })
            .await?;

        assert!(!response.cached);
        assert_eq!(generator.call_count(), 1);
        Ok(())
    }

    #[test]
    fn test_assemble_prompt_shape() {
        let context = vec![
            ScoredChunk {
                chunk_index: 0,
                text: "First fact".to_string(),
                score: 0.9,
            },
            ScoredChunk {
                chunk_index: 2,
                text: "Second fact".to_string(),
                score: 0.5,
            },
        ];

        let prompt = assemble_prompt("What is true?", &context);

        assert!(prompt.contains(NO_ANSWER_SENTENCE));
        assert!(prompt.contains("---\nFirst fact\n---\nSecond fact\n---"));
        assert!(prompt.ends_with("Question: What is true?"));

        // Higher-ranked context appears first.
        let first = prompt.find("First fact").unwrap();
        let second = prompt.find("Second fact").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_mime_type_guesses() {
        assert_eq!(mime_type_for(Path::new("a.txt")), "text/plain");
        assert_eq!(mime_type_for(Path::new("a.md")), "text/markdown");
        assert_eq!(mime_type_for(Path::new("a.json")), "application/json");
        assert_eq!(mime_type_for(Path::new("a.bin")), "application/octet-stream");
        assert_eq!(mime_type_for(Path::new("noext")), "application/octet-stream");
    }
}
