use thiserror::Error;

use crate::Capability;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool not found: {name}")]
    NotFound { name: String },

    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    #[error("{message}")]
    Execution { message: String },

    #[error("{capability} is not available")]
    Unavailable { capability: Capability },
}

impl ToolError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        Self::invalid(e.to_string())
    }
}
