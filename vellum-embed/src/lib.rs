//! # vellum-embed
//!
//! Provider contracts for the vellum retrieval pipeline: turning text into
//! embedding vectors and assembled prompts into generated answers. The crate
//! defines the two async traits the pipeline consumes and ships two
//! interchangeable implementations behind each, selected by configuration.
//!
//! ## Features
//!
//! - **Async-First Design**: Full async/await support with tokio integration
//! - **Pluggable Providers**: Trait objects selected by [`ProviderConfig`],
//!   never by conditional code paths
//! - **Deterministic Test Providers**: Offline fixed implementations that
//!   hash text into stable vectors and count the calls made against them
//! - **OpenAI-Compatible HTTP Providers**: Bearer-authenticated JSON REST
//!   with per-request timeouts and a typed failure taxonomy
//!
//! ## Quick Start
//!
//! ```
//! use vellum_embed::ProviderConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! // Deterministic providers, no network required
//! let (embedder, generator) = ProviderConfig::fixed().build()?;
//!
//! let vector = embedder.embed("What is the refund policy?").await?;
//! assert_eq!(vector.len(), embedder.dimension());
//!
//! let answer = generator.generate("Answer using the context below ...").await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`provider`]: The [`EmbeddingProvider`] and [`GenerationProvider`] traits
//! - [`fixed`]: Deterministic offline implementations for tests
//! - [`http`]: OpenAI-compatible REST implementations
//! - [`config`]: Backend selection and construction
//! - [`error`]: Error types and result handling
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] using the crate's [`EmbedError`] type.
//! Authentication and quota rejections, timeouts, transport failures, and
//! malformed replies are separate variants so callers can react to each
//! appropriately.

pub mod config;
pub mod error;
pub mod fixed;
pub mod http;
pub mod provider;

// Re-export main types for easy access
pub use config::{ProviderBackend, ProviderConfig};
pub use error::{EmbedError, Result};
pub use fixed::{FixedEmbeddingProvider, FixedGenerationProvider};
pub use http::{HttpEmbeddingProvider, HttpGenerationProvider};
pub use provider::{EmbeddingProvider, GenerationProvider};

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_pair_round_trip() -> anyhow::Result<()> {
        let (embedder, generator) = ProviderConfig::fixed().build()?;

        let vector = embedder.embed("hello").await?;
        assert_eq!(vector.len(), embedder.dimension());

        let answer = generator.generate("prompt").await?;
        assert!(!answer.is_empty());
        Ok(())
    }
}
