//! Provider contracts for the external embedding and generation services.
//!
//! The retrieval pipeline consumes these two traits and nothing else: an
//! [`EmbeddingProvider`] turns text into fixed-length vectors, and a
//! [`GenerationProvider`] turns an assembled prompt into an answer. Which
//! implementation sits behind the trait objects is decided by configuration
//! (see [`crate::config::ProviderConfig`]), never by conditional code paths:
//! tests inject the deterministic fixed providers, deployments the HTTP ones.

use crate::error::Result;
use async_trait::async_trait;

/// Trait for embedding providers that can generate embeddings from text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts in one request; the output
    /// order matches the input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the dimension of embeddings produced by this provider
    fn dimension(&self) -> usize;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;
}

/// Trait for generation providers that complete an assembled prompt
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Produce the answer text for the given prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;
}
