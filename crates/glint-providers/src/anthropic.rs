//! Anthropic (Claude) client implementation

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use glint_protocol::{
    ChatRequest, NormalizedResponse, Provider, RawFunctionCall, StreamChunk, Usage,
};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::assembler::{assemble, StreamAssembler};
use crate::response_handling::error_for_status;
use crate::{ProviderClient, ProviderConfig, ProviderError, ProviderResult, ResponseStream};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic API client
pub struct AnthropicClient {
    client: Client,
    config: ProviderConfig,
}

impl AnthropicClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .as_ref()
            .ok_or_else(|| ProviderError::Configuration("API key required for Anthropic".into()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key.expose_secret())
                .map_err(|_| ProviderError::Configuration("Invalid API key format".into()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let timeout = Duration::from_secs(config.timeout_seconds.unwrap_or(120));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{}/v1/messages", base)
    }

    fn build_request(&self, request: &ChatRequest, stream: bool) -> AnthropicRequest {
        AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens_for(request),
            system: request.system_message.clone().filter(|s| !s.is_empty()),
            messages: vec![AnthropicMessage {
                role: "user",
                content: request.prompt.clone(),
            }],
            tools: if request.tools.is_empty() {
                None
            } else {
                Some(request.tools.iter().map(|t| t.to_anthropic()).collect())
            },
            temperature: self.config.temperature_for(request),
            stream,
        }
    }

    fn convert_response(response: AnthropicResponse) -> NormalizedResponse {
        let mut text = String::new();
        let mut function_call = None;

        for block in response.content {
            match block {
                AnthropicContent::Text { text: t } => text.push_str(&t),
                AnthropicContent::ToolUse { name, input } => {
                    if function_call.is_none() {
                        function_call = Some(RawFunctionCall::new(name, input.to_string()));
                    }
                }
                AnthropicContent::Other => {}
            }
        }

        NormalizedResponse::assistant(
            response.id,
            response.model,
            (!text.is_empty()).then_some(text),
            function_call,
            response.stop_reason.as_deref().map(map_stop_reason),
            Usage::new(response.usage.input_tokens, response.usage.output_tokens),
        )
    }

    /// Decode one SSE `data:` payload
    fn parse_sse_data(data: &str) -> Vec<StreamChunk> {
        let event = match serde_json::from_str::<AnthropicStreamEvent>(data) {
            Ok(event) => event,
            Err(e) => {
                debug!(error = %e, "Skipping unparseable Anthropic stream payload");
                return Vec::new();
            }
        };

        match event {
            AnthropicStreamEvent::MessageStart { message } => {
                let mut chunks = vec![StreamChunk::MessageStart {
                    id: message.id,
                    model: message.model,
                }];
                if let Some(usage) = message.usage {
                    chunks.push(StreamChunk::MessageDelta {
                        finish_reason: None,
                        usage: Some(Usage::new(usage.input_tokens, usage.output_tokens)),
                    });
                }
                chunks
            }
            AnthropicStreamEvent::ContentBlockStart { content_block } => match content_block {
                AnthropicContent::Text { text } if !text.is_empty() => {
                    vec![StreamChunk::TextDelta { text }]
                }
                AnthropicContent::ToolUse { name, .. } => {
                    vec![StreamChunk::FunctionCallStart { name }]
                }
                _ => Vec::new(),
            },
            AnthropicStreamEvent::ContentBlockDelta { delta } => match delta {
                AnthropicDelta::TextDelta { text } => vec![StreamChunk::TextDelta { text }],
                AnthropicDelta::InputJsonDelta { partial_json } => {
                    vec![StreamChunk::FunctionArgumentsDelta { partial_json }]
                }
                AnthropicDelta::Other => Vec::new(),
            },
            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                vec![StreamChunk::MessageDelta {
                    finish_reason: delta.stop_reason.as_deref().map(map_stop_reason),
                    usage: usage.map(|u| Usage::new(u.input_tokens, u.output_tokens)),
                }]
            }
            AnthropicStreamEvent::MessageStop => vec![StreamChunk::MessageStop],
            AnthropicStreamEvent::Ping => vec![StreamChunk::Ping],
            AnthropicStreamEvent::Error { error } => vec![StreamChunk::Error {
                message: format!("{}: {}", error.r#type, error.message),
            }],
            AnthropicStreamEvent::Other => Vec::new(),
        }
    }
}

/// Anthropic stop reasons in OpenAI vocabulary
fn map_stop_reason(reason: &str) -> String {
    match reason {
        "tool_use" => "function_call",
        "end_turn" | "stop_sequence" => "stop",
        "max_tokens" => "length",
        other => other,
    }
    .to_string()
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    async fn send(&self, request: &ChatRequest) -> ProviderResult<NormalizedResponse> {
        let body = self.build_request(request, false);
        debug!(model = %body.model, tools = request.tools.len(), "Sending Anthropic request");

        let response = self.client.post(self.endpoint()).json(&body).send().await?;
        let response = error_for_status("anthropic", response).await?;

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(Self::convert_response(api_response))
    }

    async fn send_streaming(&self, request: &ChatRequest) -> ProviderResult<ResponseStream> {
        let body = self.build_request(request, true);
        debug!(model = %body.model, "Sending Anthropic streaming request");

        let response = self.client.post(self.endpoint()).json(&body).send().await?;
        let response = error_for_status("anthropic", response).await?;

        let chunks = response.bytes_stream().eventsource().flat_map(|event| {
            let items: Vec<ProviderResult<StreamChunk>> = match event {
                Ok(event) => Self::parse_sse_data(&event.data)
                    .into_iter()
                    .map(Ok)
                    .collect(),
                Err(e) => vec![Err(ProviderError::StreamError(e.to_string()))],
            };
            futures::stream::iter(items)
        });

        Ok(assemble(chunks, StreamAssembler::new(self.config.model.clone())))
    }

    fn supports_tools(&self) -> bool {
        true
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn provider(&self) -> Provider {
        Provider::Anthropic
    }
}

// API request/response types
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContent {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    content: Vec<AnthropicContent>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicStreamEvent {
    MessageStart {
        message: AnthropicStreamMessage,
    },
    ContentBlockStart {
        content_block: AnthropicContent,
    },
    ContentBlockDelta {
        delta: AnthropicDelta,
    },
    MessageDelta {
        delta: AnthropicMessageDelta,
        #[serde(default)]
        usage: Option<AnthropicUsage>,
    },
    MessageStop,
    Ping,
    Error {
        error: AnthropicError,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicStreamMessage {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicDelta {
    TextDelta {
        text: String,
    },
    InputJsonDelta {
        partial_json: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicMessageDelta {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    r#type: String,
    message: String,
}
