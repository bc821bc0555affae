//! Provider selection and configuration.
//!
//! A [`ProviderConfig`] decides which [`EmbeddingProvider`]/
//! [`GenerationProvider`] pair a deployment gets: the deterministic fixed
//! providers for tests and offline work, or the HTTP providers for a live
//! OpenAI-compatible API. The choice is data, not code: callers build the
//! config (typically from CLI flags and environment variables) and ask it for
//! the trait objects.

use crate::error::{EmbedError, Result};
use crate::fixed::{DEFAULT_FIXED_DIMENSION, FixedEmbeddingProvider, FixedGenerationProvider};
use crate::http::{HttpEmbeddingProvider, HttpGenerationProvider};
use crate::provider::{EmbeddingProvider, GenerationProvider};
use std::str::FromStr;
use std::sync::Arc;

/// Default per-request timeout for the HTTP providers.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Default embedding model for the HTTP backend.
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";

/// Default generation model for the HTTP backend.
pub const DEFAULT_GENERATE_MODEL: &str = "gpt-4o-mini";

/// Vector width of [`DEFAULT_EMBED_MODEL`].
const DEFAULT_HTTP_DIMENSION: usize = 1536;

/// Which provider implementation a config selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderBackend {
    /// Deterministic offline providers (see [`crate::fixed`]).
    Fixed,
    /// OpenAI-compatible REST providers (see [`crate::http`]).
    Http,
}

impl FromStr for ProviderBackend {
    type Err = EmbedError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(ProviderBackend::Fixed),
            "http" | "openai" => Ok(ProviderBackend::Http),
            other => Err(EmbedError::invalid_config(format!(
                "unknown provider backend '{other}', expected 'fixed' or 'http'"
            ))),
        }
    }
}

/// Configuration for constructing a provider pair.
#[derive(Clone)]
pub struct ProviderConfig {
    backend: ProviderBackend,
    api_base: String,
    api_key: String,
    embed_model: String,
    generate_model: String,
    embedding_dimension: usize,
    timeout_seconds: u64,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("backend", &self.backend)
            .field("api_base", &self.api_base)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("embed_model", &self.embed_model)
            .field("generate_model", &self.generate_model)
            .field("embedding_dimension", &self.embedding_dimension)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl ProviderConfig {
    /// Config for the deterministic fixed providers.
    pub fn fixed() -> Self {
        Self {
            backend: ProviderBackend::Fixed,
            api_base: String::new(),
            api_key: String::new(),
            embed_model: String::new(),
            generate_model: String::new(),
            embedding_dimension: DEFAULT_FIXED_DIMENSION,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }

    /// Config for the HTTP providers against the given API base.
    pub fn http<S: Into<String>, K: Into<String>>(api_base: S, api_key: K) -> Self {
        Self {
            backend: ProviderBackend::Http,
            api_base: api_base.into(),
            api_key: api_key.into(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            generate_model: DEFAULT_GENERATE_MODEL.to_string(),
            embedding_dimension: DEFAULT_HTTP_DIMENSION,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }

    /// Override the embedding model (HTTP backend).
    pub fn with_embed_model<S: Into<String>>(mut self, model: S) -> Self {
        self.embed_model = model.into();
        self
    }

    /// Override the generation model (HTTP backend).
    pub fn with_generate_model<S: Into<String>>(mut self, model: S) -> Self {
        self.generate_model = model.into();
        self
    }

    /// Override the embedding vector width.
    pub fn with_embedding_dimension(mut self, dimension: usize) -> Self {
        self.embedding_dimension = dimension;
        self
    }

    /// Override the per-request timeout.
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// The backend this config selects.
    pub fn backend(&self) -> ProviderBackend {
        self.backend
    }

    /// Construct the provider pair this config describes.
    ///
    /// # Errors
    /// Returns [`EmbedError::InvalidConfig`] when the HTTP backend is selected
    /// without an API base or key.
    pub fn build(&self) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn GenerationProvider>)> {
        match self.backend {
            ProviderBackend::Fixed => {
                tracing::debug!(
                    "Using fixed providers with dimension {}",
                    self.embedding_dimension
                );
                Ok((
                    Arc::new(FixedEmbeddingProvider::new(self.embedding_dimension)),
                    Arc::new(FixedGenerationProvider::default()),
                ))
            }
            ProviderBackend::Http => {
                if self.api_base.is_empty() {
                    return Err(EmbedError::invalid_config(
                        "http backend requires an API base URL",
                    ));
                }
                if self.api_key.is_empty() {
                    return Err(EmbedError::invalid_config(
                        "http backend requires an API key",
                    ));
                }
                tracing::debug!(
                    "Using http providers at {} (embed: {}, generate: {})",
                    self.api_base,
                    self.embed_model,
                    self.generate_model
                );
                Ok((
                    Arc::new(HttpEmbeddingProvider::new(
                        &self.api_base,
                        &self.api_key,
                        &self.embed_model,
                        self.embedding_dimension,
                        self.timeout_seconds,
                    )?),
                    Arc::new(HttpGenerationProvider::new(
                        &self.api_base,
                        &self.api_key,
                        &self.generate_model,
                        self.timeout_seconds,
                    )?),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parses_from_str() {
        assert_eq!("fixed".parse::<ProviderBackend>().unwrap(), ProviderBackend::Fixed);
        assert_eq!("HTTP".parse::<ProviderBackend>().unwrap(), ProviderBackend::Http);
        assert_eq!("openai".parse::<ProviderBackend>().unwrap(), ProviderBackend::Http);
        assert!("tarot".parse::<ProviderBackend>().is_err());
    }

    #[test]
    fn test_fixed_config_builds_providers() {
        let (embedder, generator) = ProviderConfig::fixed()
            .with_embedding_dimension(32)
            .build()
            .unwrap();
        assert_eq!(embedder.dimension(), 32);
        assert_eq!(embedder.provider_name(), "fixed-embedding");
        assert_eq!(generator.provider_name(), "fixed-generation");
    }

    #[test]
    fn test_http_config_requires_base_and_key() {
        assert!(ProviderConfig::http("", "sk-test").build().is_err());
        assert!(ProviderConfig::http("https://api.openai.com/v1", "").build().is_err());
        assert!(
            ProviderConfig::http("https://api.openai.com/v1", "sk-test")
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ProviderConfig::http("https://api.openai.com/v1", "sk-very-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("***"));
    }
}
