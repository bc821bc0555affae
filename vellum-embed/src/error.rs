//! Error types for the provider layer

/// Result type for provider operations.
///
/// This is a convenience type alias that uses [`EmbedError`] as the error type.
/// Used throughout the crate for operations that can fail.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding and generation provider operations.
///
/// The variants separate the failure modes a caller is expected to treat
/// differently: configuration mistakes are caught before a request is made,
/// authentication and quota rejections are fatal, timeouts are distinguishable
/// from other transport failures, and a malformed reply from an otherwise
/// healthy provider is its own condition.
///
/// The error type integrates with the [`thiserror`] crate for automatic
/// [`std::error::Error`] implementation and supports error chaining for
/// detailed error context.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Error when the provider configuration is invalid
    #[error("Invalid provider configuration: {message}")]
    InvalidConfig { message: String },

    /// The provider rejected the credentials or the account is out of quota
    #[error("Provider rejected the request (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    /// The request did not complete within the configured timeout
    #[error("Provider request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The request could not be sent or the connection failed mid-flight
    #[error("Provider request failed: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },

    /// The provider answered with a non-success HTTP status
    #[error("Provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The provider answered 2xx but the body was not in the expected shape
    #[error("Malformed provider response: {message}")]
    Response { message: String },
}

impl EmbedError {
    /// Create an invalid configuration error with a custom message.
    ///
    /// # Arguments
    /// * `message` - A descriptive error message explaining what's wrong with
    ///   the configuration
    ///
    /// # Returns
    /// A new [`EmbedError::InvalidConfig`] variant
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a malformed-response error with a custom message.
    ///
    /// # Arguments
    /// * `message` - What was missing or wrong in the provider's reply
    ///
    /// # Returns
    /// A new [`EmbedError::Response`] variant
    pub fn response<S: Into<String>>(message: S) -> Self {
        Self::Response {
            message: message.into(),
        }
    }

    /// Classify a [`reqwest::Error`] from a sent request.
    ///
    /// Timeouts get their own variant so callers can tell a slow provider
    /// apart from an unreachable one; everything else stays a transport
    /// failure with the original error as source.
    ///
    /// # Arguments
    /// * `source` - The error returned by `reqwest`
    /// * `timeout_seconds` - The timeout that was configured on the client,
    ///   reported back in the [`EmbedError::Timeout`] message
    pub fn request(source: reqwest::Error, timeout_seconds: u64) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                seconds: timeout_seconds,
            }
        } else {
            Self::Transport { source }
        }
    }
}
