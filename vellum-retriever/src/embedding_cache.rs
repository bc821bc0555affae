//! Content-addressed on-disk cache for embedding artifacts.
//!
//! This module stores the expensive outputs of the pipeline (embedding
//! vectors) as JSON files keyed by content identity, so that re-processing an
//! unchanged document or re-asking an equivalent prompt never hits the
//! embedding provider again.
//!
//! ## Layout
//!
//! ```text
//! <root>/
//! ├── docs/<fingerprint>.json   # chunk embeddings for one processed document
//! └── prompts/<key>.json        # cached embedding for one normalized prompt
//! ```
//!
//! Document artifacts are keyed by [`EmbeddingCache::fingerprint`], a BLAKE3
//! hash of the document's original name and byte size. Prompt artifacts are
//! keyed by [`prompt_key`](crate::prompt::prompt_key), a BLAKE3 hash of the
//! normalized prompt text, so prompts differing only in case or whitespace
//! share one entry.
//!
//! ## Write Discipline
//!
//! Writes go to a temporary file in the destination directory and are
//! published with an atomic rename. Readers therefore observe either the
//! previous complete artifact or the new complete artifact, never a torn
//! write. Concurrent writers for the same key race benignly: last rename
//! wins and every intermediate state is a complete artifact.

use crate::error::{Result, RetrieveError};
use crate::prompt::prompt_key;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Name of the cache directory under an engine's base directory.
pub const CACHE_DIR: &str = "cache";

/// One chunk of a processed document: its text and its embedding vector.
///
/// A chunk's index is its position in [`EmbeddingSet::chunks`]; the order of
/// appearance in the source document is preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Chunk text as produced by the splitter
    pub text: String,
    /// Embedding vector for the chunk text
    pub embedding: Vec<f32>,
}

/// The complete set of chunk embeddings derived from one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSet {
    /// When this artifact was written
    pub created_at: DateTime<Utc>,
    /// Chunks in document order
    pub chunks: Vec<ChunkRecord>,
}

/// A cached embedding for one normalized prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptCacheEntry {
    /// The prompt text the embedding was computed for
    pub prompt: String,
    /// Embedding vector for the prompt
    pub embedding: Vec<f32>,
    /// When this entry was written
    pub created_at: DateTime<Utc>,
}

/// Handle to the on-disk embedding cache.
///
/// Cheap to clone; the handle holds only resolved directory paths.
///
/// # Example
///
/// ```no_run
/// use vellum_retriever::embedding_cache::EmbeddingCache;
///
/// # async fn example() -> vellum_retriever::error::Result<()> {
/// let cache = EmbeddingCache::open("/tmp/vellum-cache")?;
/// let id = EmbeddingCache::fingerprint("notes.txt", 2048);
/// if let Some(set) = cache.load(&id).await? {
///     println!("{} chunks cached", set.chunks.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    docs_dir: PathBuf,
    prompts_dir: PathBuf,
}

impl EmbeddingCache {
    /// Open the cache rooted at `root`, creating the `docs/` and `prompts/`
    /// subdirectories if they do not exist yet.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let docs_dir = root.join("docs");
        let prompts_dir = root.join("prompts");
        std::fs::create_dir_all(&docs_dir)?;
        std::fs::create_dir_all(&prompts_dir)?;
        Ok(Self {
            docs_dir,
            prompts_dir,
        })
    }

    /// Compute the cache identity of a document from its original name and
    /// byte size: a hex-encoded BLAKE3 hash.
    ///
    /// Two uploads with the same name and size share a fingerprint and
    /// therefore share one cached artifact.
    pub fn fingerprint(name: &str, size: u64) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(name.as_bytes());
        hasher.update(&size.to_le_bytes());
        hex::encode(hasher.finalize().as_bytes())
    }

    /// Check whether a document artifact exists for `id`.
    pub async fn exists(&self, id: &str) -> bool {
        tokio::fs::try_exists(self.doc_path(id)).await.unwrap_or(false)
    }

    /// Write the embedding artifact for a document.
    ///
    /// `texts` and `vectors` must be parallel: `vectors[i]` is the embedding
    /// of `texts[i]`. The artifact is published atomically; an existing
    /// artifact under the same `id` is replaced wholesale.
    ///
    /// # Returns
    /// The [`EmbeddingSet`] exactly as written to disk.
    pub async fn save(
        &self,
        id: &str,
        texts: &[String],
        vectors: &[Vec<f32>],
    ) -> Result<EmbeddingSet> {
        if texts.len() != vectors.len() {
            return Err(RetrieveError::validation(format!(
                "chunk texts and vectors must be parallel: {} texts, {} vectors",
                texts.len(),
                vectors.len()
            )));
        }
        let set = EmbeddingSet {
            created_at: Utc::now(),
            chunks: texts
                .iter()
                .zip(vectors.iter())
                .map(|(text, embedding)| ChunkRecord {
                    text: text.clone(),
                    embedding: embedding.clone(),
                })
                .collect(),
        };
        let payload = serde_json::to_vec(&set)?;
        write_atomic(self.docs_dir.clone(), self.doc_path(id), payload).await?;
        Ok(set)
    }

    /// Load the embedding artifact for a document.
    ///
    /// # Returns
    /// `Ok(None)` when no artifact exists for `id`. A present but undecodable
    /// artifact is an error, not a miss.
    pub async fn load(&self, id: &str) -> Result<Option<EmbeddingSet>> {
        read_json(self.doc_path(id)).await
    }

    /// List the ids of all cached document artifacts, sorted
    /// lexicographically.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.docs_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Delete the document artifact for `id`.
    ///
    /// # Returns
    /// `true` if an artifact was removed, `false` if none existed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.doc_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up the cached embedding for a prompt, keyed by its normalized
    /// form.
    pub async fn get_prompt_embedding(&self, text: &str) -> Result<Option<Vec<f32>>> {
        let entry: Option<PromptCacheEntry> = read_json(self.prompt_path(text)).await?;
        Ok(entry.map(|e| e.embedding))
    }

    /// Store the embedding for a prompt under its normalized key.
    ///
    /// Replaces any existing entry for an equivalent prompt.
    pub async fn put_prompt_embedding(&self, text: &str, embedding: Vec<f32>) -> Result<()> {
        let entry = PromptCacheEntry {
            prompt: text.to_string(),
            embedding,
            created_at: Utc::now(),
        };
        let payload = serde_json::to_vec(&entry)?;
        write_atomic(self.prompts_dir.clone(), self.prompt_path(text), payload).await
    }

    fn doc_path(&self, id: &str) -> PathBuf {
        self.docs_dir.join(format!("{id}.json"))
    }

    fn prompt_path(&self, text: &str) -> PathBuf {
        self.prompts_dir.join(format!("{}.json", prompt_key(text)))
    }
}

/// Read and decode a JSON artifact, treating a missing file as `None`.
async fn read_json<T: serde::de::DeserializeOwned>(path: PathBuf) -> Result<Option<T>> {
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Write `payload` to `path` via a temporary file in `dir` plus an atomic
/// rename. Runs on the blocking pool.
async fn write_atomic(dir: PathBuf, path: PathBuf, payload: Vec<u8>) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&payload)?;
        tmp.persist(&path)
            .map_err(|e| RetrieveError::Io { source: e.error })?;
        Ok(())
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn sample_vectors() -> (Vec<String>, Vec<Vec<f32>>) {
        let texts = vec!["first chunk".to_string(), "second chunk".to_string()];
        let vectors = vec![vec![1.0, 0.0, 0.25], vec![0.0, 1.0, -0.5]];
        (texts, vectors)
    }

    #[test]
    fn test_fingerprint_is_stable_and_keyed_on_name_and_size() {
        let a = EmbeddingCache::fingerprint("report.txt", 1024);
        let b = EmbeddingCache::fingerprint("report.txt", 1024);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        assert_ne!(a, EmbeddingCache::fingerprint("other.txt", 1024));
        assert_ne!(a, EmbeddingCache::fingerprint("report.txt", 1025));
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let cache = EmbeddingCache::open(temp_dir.path())?;
        let (texts, vectors) = sample_vectors();

        let written = cache.save("doc-a", &texts, &vectors).await?;
        let loaded = cache.load("doc-a").await?.unwrap();

        assert_eq!(loaded, written);
        assert_eq!(loaded.chunks.len(), 2);
        assert_eq!(loaded.chunks[0].text, "first chunk");
        assert_eq!(loaded.chunks[1].embedding, vec![0.0, 1.0, -0.5]);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_missing_artifact_returns_none() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let cache = EmbeddingCache::open(temp_dir.path())?;

        assert!(cache.load("nothing-here").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_exists_and_delete() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let cache = EmbeddingCache::open(temp_dir.path())?;
        let (texts, vectors) = sample_vectors();

        assert!(!cache.exists("doc-a").await);
        cache.save("doc-a", &texts, &vectors).await?;
        assert!(cache.exists("doc-a").await);

        assert!(cache.delete("doc-a").await?);
        assert!(!cache.exists("doc-a").await);
        assert!(cache.load("doc-a").await?.is_none());

        // Deleting again reports that nothing was there.
        assert!(!cache.delete("doc-a").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_is_sorted() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let cache = EmbeddingCache::open(temp_dir.path())?;
        let (texts, vectors) = sample_vectors();

        for id in ["zebra", "alpha", "middle"] {
            cache.save(id, &texts, &vectors).await?;
        }

        assert_eq!(cache.list().await?, vec!["alpha", "middle", "zebra"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_rejects_mismatched_lengths() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let cache = EmbeddingCache::open(temp_dir.path())?;
        let (texts, _) = sample_vectors();

        let result = cache.save("doc-a", &texts, &[vec![1.0]]).await;
        assert!(matches!(result, Err(RetrieveError::Validation { .. })));
        assert!(!cache.exists("doc-a").await);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_replaces_existing_artifact() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let cache = EmbeddingCache::open(temp_dir.path())?;
        let (texts, vectors) = sample_vectors();

        cache.save("doc-a", &texts, &vectors).await?;
        let replacement = vec!["only chunk".to_string()];
        cache.save("doc-a", &replacement, &[vec![0.5, 0.5]]).await?;

        let loaded = cache.load("doc-a").await?.unwrap();
        assert_eq!(loaded.chunks.len(), 1);
        assert_eq!(loaded.chunks[0].text, "only chunk");
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_artifact_is_an_error_not_a_miss() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let cache = EmbeddingCache::open(temp_dir.path())?;

        let path = temp_dir.path().join("docs").join("broken.json");
        tokio::fs::write(&path, b"{ not json").await?;

        let result = cache.load("broken").await;
        assert!(matches!(result, Err(RetrieveError::CacheCorrupt { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_prompt_embeddings_are_shared_across_formatting() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let cache = EmbeddingCache::open(temp_dir.path())?;

        assert!(cache.get_prompt_embedding("What is Rust?").await?.is_none());

        cache
            .put_prompt_embedding("What is Rust?", vec![0.1, 0.2, 0.3])
            .await?;

        // Same question, different case and spacing: same cache entry.
        let hit = cache.get_prompt_embedding("  what IS rust?  ").await?;
        assert_eq!(hit, Some(vec![0.1, 0.2, 0.3]));

        assert!(cache.get_prompt_embedding("What is Go?").await?.is_none());
        Ok(())
    }
}
