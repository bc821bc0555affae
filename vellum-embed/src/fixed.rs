//! Deterministic offline providers for tests and local development.
//!
//! Both providers are pure functions of their input plus a little bookkeeping:
//! the embedding provider derives each vector from an FNV hash of the text, so
//! the same text always maps to the same vector without any model or network,
//! and the generation provider returns a configured canned answer. Each one
//! records the calls made against it, which lets tests assert not just on
//! results but on *how many* provider requests a pipeline actually made.

use crate::error::Result;
use crate::provider::{EmbeddingProvider, GenerationProvider};
use async_trait::async_trait;
use fnv::FnvHasher;
use std::hash::Hasher;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default vector width for the fixed embedding provider, matching the small
/// sentence-transformer models this stands in for.
pub const DEFAULT_FIXED_DIMENSION: usize = 384;

/// Deterministic embedding provider: same text in, same vector out.
#[derive(Debug)]
pub struct FixedEmbeddingProvider {
    dimension: usize,
    calls: AtomicUsize,
    embedded_texts: Mutex<Vec<String>>,
}

impl Default for FixedEmbeddingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_FIXED_DIMENSION)
    }
}

impl FixedEmbeddingProvider {
    /// Create a provider emitting vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
            embedded_texts: Mutex::new(Vec::new()),
        }
    }

    /// Number of embed/embed_batch requests made against this provider.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every text this provider has been asked to embed, in call order.
    pub fn embedded_texts(&self) -> Vec<String> {
        self.embedded_texts.lock().unwrap().clone()
    }

    /// Derive the L2-normalized vector for one text.
    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut hasher = FnvHasher::default();
        hasher.write(text.as_bytes());
        // xorshift64* needs a nonzero state.
        let mut state = hasher.finish() | 1;

        let mut vector: Vec<f32> = (0..self.dimension)
            .map(|_| {
                state ^= state >> 12;
                state ^= state << 25;
                state ^= state >> 27;
                let draw = state.wrapping_mul(0x2545_F491_4F6C_DD1D);
                ((draw >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0) as f32
            })
            .collect();

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.embedded_texts.lock().unwrap().push(text.to_string());
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut recorded = self.embedded_texts.lock().unwrap();
        recorded.extend(texts.iter().cloned());
        drop(recorded);
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "fixed-embedding"
    }
}

/// Deterministic generation provider returning a configured canned answer.
#[derive(Debug)]
pub struct FixedGenerationProvider {
    answer: String,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl Default for FixedGenerationProvider {
    fn default() -> Self {
        Self::new("This answer came from the fixed generation provider.")
    }
}

impl FixedGenerationProvider {
    /// Create a provider that answers every prompt with `answer`.
    pub fn new<S: Into<String>>(answer: S) -> Self {
        Self {
            answer: answer.into(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Number of generate requests made against this provider.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every prompt this provider has been asked to complete, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationProvider for FixedGenerationProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.answer.clone())
    }

    fn provider_name(&self) -> &str {
        "fixed-generation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_embedding_is_deterministic() -> anyhow::Result<()> {
        let provider = FixedEmbeddingProvider::new(64);

        let first = provider.embed("What is the refund policy?").await?;
        let second = provider.embed("What is the refund policy?").await?;
        let other = provider.embed("Something else entirely").await?;

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(first.len(), 64);
        Ok(())
    }

    #[tokio::test]
    async fn test_fixed_embedding_is_normalized() -> anyhow::Result<()> {
        let provider = FixedEmbeddingProvider::default();
        let vector = provider.embed("normalize me").await?;

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm was {norm}");
        Ok(())
    }

    #[tokio::test]
    async fn test_fixed_embedding_batch_preserves_order() -> anyhow::Result<()> {
        let provider = FixedEmbeddingProvider::new(32);
        let texts = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];

        let batch = provider.embed_batch(&texts).await?;
        assert_eq!(batch.len(), 3);
        for (text, vector) in texts.iter().zip(&batch) {
            assert_eq!(vector, &provider.vector_for(text));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_fixed_providers_count_calls() -> anyhow::Result<()> {
        let embedder = FixedEmbeddingProvider::new(16);
        let generator = FixedGenerationProvider::new("canned");

        assert_eq!(embedder.call_count(), 0);
        embedder.embed("one").await?;
        embedder.embed_batch(&["two".to_string(), "three".to_string()]).await?;
        assert_eq!(embedder.call_count(), 2);
        assert_eq!(embedder.embedded_texts(), vec!["one", "two", "three"]);

        let answer = generator.generate("any prompt").await?;
        assert_eq!(answer, "canned");
        assert_eq!(generator.call_count(), 1);
        assert_eq!(generator.prompts(), vec!["any prompt"]);
        Ok(())
    }
}
