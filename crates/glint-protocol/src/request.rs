//! Request types

use serde::{Deserialize, Serialize};

use crate::ToolDefinition;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// A single conversational request from the caller.
///
/// A request is immutable once handed to a worker. Retries never mutate the
/// original; [`Request::retry`] derives a new one from the corrective prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub tools_enabled: bool,
    pub stream: bool,
    #[serde(default)]
    pub retry_count: u32,
    /// Key used to look up stored preferences for the current song
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_id: Option<String>,
}

impl Request {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            prompt: prompt.into(),
            system_message: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            tools_enabled: true,
            stream: false,
            retry_count: 0,
            song_id: None,
        }
    }

    pub fn with_system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = Some(system_message.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_tools(mut self, enabled: bool) -> Self {
        self.tools_enabled = enabled;
        self
    }

    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.stream = enabled;
        self
    }

    pub fn with_song_id(mut self, song_id: impl Into<String>) -> Self {
        self.song_id = Some(song_id.into());
        self
    }

    /// Derive the follow-up request for a corrective prompt.
    ///
    /// Settings carry over; the id is fresh and the retry count goes up by one.
    pub fn retry(&self, corrective_prompt: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            prompt: corrective_prompt.into(),
            retry_count: self.retry_count + 1,
            ..self.clone()
        }
    }

    pub fn is_retry(&self) -> bool {
        self.retry_count > 0
    }
}

/// What a provider client receives for one round trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_message: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            tools: Vec::new(),
        }
    }

    /// Shape a caller request; tools are only attached when the request enables them
    pub fn from_request(request: &Request, tools: Vec<ToolDefinition>) -> Self {
        Self {
            prompt: request.prompt.clone(),
            system_message: request.system_message.clone(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            tools: if request.tools_enabled {
                tools
            } else {
                Vec::new()
            },
        }
    }

    pub fn with_system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = Some(system_message.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}
