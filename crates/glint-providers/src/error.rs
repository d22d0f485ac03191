//! Provider error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("rate limit exceeded: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("provider unavailable: {provider}")]
    Unavailable { provider: String },
}

impl ProviderError {
    /// Whether a caller could reasonably try again later.
    ///
    /// The engine itself never retries provider errors; this is exposed for
    /// hosts that want to.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network(_) | Self::Unavailable { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::RateLimited { retry_after_ms: 10 }.is_retryable());
        assert!(ProviderError::Status {
            status: 502,
            message: "bad gateway".into()
        }
        .is_retryable());
        assert!(!ProviderError::Status {
            status: 400,
            message: "bad request".into()
        }
        .is_retryable());
        assert!(!ProviderError::AuthenticationFailed("nope".into()).is_retryable());
    }

    #[test]
    fn test_retry_after() {
        assert_eq!(
            ProviderError::RateLimited { retry_after_ms: 1500 }.retry_after_ms(),
            Some(1500)
        );
        assert_eq!(ProviderError::Configuration("x".into()).retry_after_ms(), None);
    }
}
