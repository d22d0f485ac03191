//! Engine error types

use glint_protocol::ArgumentParseError;
use glint_providers::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("malformed arguments for {name}: {message}")]
    MalformedToolCall { name: String, message: String },

    #[error("tool {tool} failed: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("request interrupted")]
    Interrupted,
}

impl EngineError {
    /// Tool failures are the only errors the coordinator retries
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::MalformedToolCall { .. } | Self::ToolExecution { .. }
        )
    }
}

impl From<ArgumentParseError> for EngineError {
    fn from(e: ArgumentParseError) -> Self {
        Self::MalformedToolCall {
            name: e.name,
            message: e.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let malformed = EngineError::from(ArgumentParseError {
            name: "create_segment".into(),
            message: "expected an object, got an array".into(),
        });
        assert_eq!(
            malformed.to_string(),
            "malformed arguments for create_segment: expected an object, got an array"
        );
        assert!(malformed.is_retryable());

        let config = EngineError::Configuration("no provider client".into());
        assert_eq!(config.to_string(), "Configuration error: no provider client");
        assert!(!config.is_retryable());
        assert!(!EngineError::Interrupted.is_retryable());
    }
}
