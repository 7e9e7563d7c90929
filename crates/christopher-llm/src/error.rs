//! LLM client error types.
//!
//! All client operations surface errors through [`LlmError`].  Conversions
//! into the kernel's [`ClassifierError`] and [`HandlerError`] let the client
//! sit directly behind the classifier gateway and behind chat handlers.

use christopher_kernel::{ClassifierError, HandlerError};

/// Unified error type for the completion client.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    // -- Transport errors ----------------------------------------------------
    /// An HTTP request to the provider failed or returned a non-2xx status.
    #[error("llm request failed: {reason}")]
    RequestFailed { reason: String },

    /// The provider response could not be parsed into the expected format.
    #[error("llm response parse error: {reason}")]
    ParseFailed { reason: String },

    // -- Configuration errors ------------------------------------------------
    /// The API key is missing for a provider that requires one.
    #[error("missing api key for provider: {provider}")]
    MissingApiKey { provider: String },

    /// The configured base URL is not an absolute http(s) URL with a host.
    #[error("invalid base url `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The requested operation is not offered by the configured provider.
    #[error("{operation} is not supported by provider {provider}")]
    Unsupported { provider: String, operation: String },
}

/// Convenience alias used throughout the llm crate.
pub type Result<T> = std::result::Result<T, LlmError>;

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        Self::RequestFailed {
            reason: err.to_string(),
        }
    }
}

impl From<LlmError> for ClassifierError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::ParseFailed { reason } => ClassifierError::Malformed { reason },
            other => ClassifierError::Backend {
                reason: other.to_string(),
            },
        }
    }
}

impl From<LlmError> for HandlerError {
    fn from(err: LlmError) -> Self {
        HandlerError::Upstream(err.to_string())
    }
}
