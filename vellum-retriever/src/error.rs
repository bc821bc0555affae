//! Error types for retrieval operations.
//!
//! [`RetrieveError`] is the single error enum for the whole pipeline. Callers
//! that need to branch on failure class (bad request vs. missing entity vs.
//! upstream provider outage vs. local storage trouble) can match on the
//! variant; everything else can bubble it up with `?`.

use vellum_embed::EmbedError;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrieveError>;

/// Which upstream provider a failed call was addressed to.
///
/// Attached to [`RetrieveError::Provider`] so callers can tell an embedding
/// outage apart from a generation outage without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStage {
    /// The call was computing an embedding vector.
    Embedding,
    /// The call was generating an answer.
    Generation,
}

impl std::fmt::Display for ProviderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderStage::Embedding => write!(f, "embedding"),
            ProviderStage::Generation => write!(f, "generation"),
        }
    }
}

/// Errors that can occur during document processing and retrieval.
#[derive(Debug, thiserror::Error)]
pub enum RetrieveError {
    /// The request itself is malformed: blank prompt, unresolvable document
    /// reference, contradictory feedback flags.
    #[error("Invalid request: {message}")]
    Validation {
        /// What was wrong with the request
        message: String,
    },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// The kind of entity that was looked up
        entity: &'static str,
        /// The identifier that failed to resolve
        key: String,
    },

    /// An upstream provider call failed. The stage records whether the
    /// pipeline was embedding or generating at the time.
    #[error("{stage} provider call failed: {source}")]
    Provider {
        /// Pipeline stage the failure occurred in
        stage: ProviderStage,
        /// Underlying provider error
        #[source]
        source: EmbedError,
    },

    /// A database operation failed.
    #[error("Database operation failed: {source}")]
    Storage {
        #[from]
        source: sqlx::Error,
    },

    /// A filesystem operation failed.
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// A cached artifact could not be decoded.
    #[error("Cache entry is corrupt: {source}")]
    CacheCorrupt {
        #[from]
        source: serde_json::Error,
    },

    /// A chunk embedding does not have the same dimension as the query
    /// embedding, so no similarity score can be computed.
    #[error(
        "Embedding dimension mismatch: query has {expected} dimensions, chunk {chunk_index} has {found}"
    )]
    DimensionMismatch {
        /// Dimension of the query embedding
        expected: usize,
        /// Dimension of the offending chunk embedding
        found: usize,
        /// Index of the offending chunk
        chunk_index: usize,
    },

    /// A background task panicked or was cancelled.
    #[error("Task failed: {source}")]
    Task {
        #[from]
        source: tokio::task::JoinError,
    },
}

impl RetrieveError {
    /// Create a validation error.
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not-found error for the given entity kind and key.
    pub fn not_found<S: Into<String>>(entity: &'static str, key: S) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Wrap a provider error from the embedding stage.
    pub fn embedding(source: EmbedError) -> Self {
        Self::Provider {
            stage: ProviderStage::Embedding,
            source,
        }
    }

    /// Wrap a provider error from the generation stage.
    pub fn generation(source: EmbedError) -> Self {
        Self::Provider {
            stage: ProviderStage::Generation,
            source,
        }
    }
}
