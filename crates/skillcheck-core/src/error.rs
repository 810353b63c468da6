//! Error types for the assessment engines and their upstream providers.
//!
//! `ProviderError` lives here rather than in `skillcheck-providers` so the
//! gateway can downcast transport failures and classify them without string
//! matching.

use thiserror::Error;

/// Rejections surfaced directly to the caller.
///
/// Upstream text-generation failures never appear here: they are absorbed by
/// the gateway into a degraded outcome.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssessError {
    /// Malformed or self-contradictory request parameters.
    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    /// Input that the validation layer should never have let through.
    #[error("contract violation: {0}")]
    ContractViolation(String),
}

/// Errors that can occur when talking to a text-generation provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// Text generation is switched off in configuration.
    #[error("text generation disabled")]
    Disabled,
}

impl ProviderError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ProviderError::AuthenticationFailed(_)
                | ProviderError::ModelNotFound(_)
                | ProviderError::Disabled
        )
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ProviderError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}
