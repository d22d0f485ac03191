//! Streaming types

use serde::{Deserialize, Serialize};

use crate::{NormalizedResponse, Usage};

/// One decoded increment from a provider stream, backend-neutral
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    MessageStart {
        id: String,
        model: String,
    },
    TextDelta {
        text: String,
    },
    FunctionCallStart {
        name: String,
    },
    FunctionArgumentsDelta {
        partial_json: String,
    },
    MessageDelta {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
    MessageStop,
    Ping,
    Error {
        message: String,
    },
}

/// What a streaming send yields to its caller.
///
/// Text arrives as `Chunk`s in order; the stream ends with exactly one
/// `Complete` carrying the assembled response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    Chunk(String),
    Complete(NormalizedResponse),
}

impl StreamEvent {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}
