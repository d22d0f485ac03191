//! OpenAI client implementation
//!
//! Also serves OpenAI-compatible endpoints (OpenRouter, custom gateways).

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use glint_protocol::{
    ChatRequest, NormalizedResponse, Provider, RawFunctionCall, StreamChunk, Usage,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::assembler::{assemble, StreamAssembler};
use crate::response_handling::error_for_status;
use crate::{ProviderClient, ProviderConfig, ProviderError, ProviderResult, ResponseStream};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// OpenAI API client
pub struct OpenAIClient {
    client: Client,
    config: ProviderConfig,
}

impl OpenAIClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        match config.api_key.as_ref() {
            Some(api_key) => {
                let value = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
                    .map_err(|_| ProviderError::Configuration("Invalid API key format".into()))?;
                headers.insert(AUTHORIZATION, value);
            }
            None if config.provider != Provider::Custom => {
                return Err(ProviderError::Configuration(format!(
                    "API key required for {}",
                    config.provider
                )));
            }
            None => {}
        }

        let timeout = Duration::from_secs(config.timeout_seconds.unwrap_or(120));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url())
    }

    fn build_request(&self, request: &ChatRequest, stream: bool) -> OpenAIRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system_message.as_ref().filter(|s| !s.is_empty()) {
            messages.push(OpenAIMessage {
                role: "system",
                content: system.clone(),
            });
        }
        messages.push(OpenAIMessage {
            role: "user",
            content: request.prompt.clone(),
        });

        OpenAIRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens_for(request),
            temperature: self.config.temperature_for(request),
            tools: if request.tools.is_empty() {
                None
            } else {
                Some(request.tools.iter().map(|t| t.to_openai()).collect())
            },
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    fn convert_response(response: OpenAIResponse) -> NormalizedResponse {
        let choice = response.choices.into_iter().next().unwrap_or_default();

        let function_call = choice
            .message
            .tool_calls
            .and_then(|calls| calls.into_iter().next())
            .map(|tc| tc.function)
            .or(choice.message.function_call)
            .map(|f| RawFunctionCall::new(f.name, f.arguments));

        NormalizedResponse::assistant(
            response.id,
            response.model,
            choice.message.content,
            function_call,
            choice.finish_reason.map(|r| normalize_finish_reason(&r)),
            response
                .usage
                .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens))
                .unwrap_or_else(Usage::zero),
        )
    }

    /// Decode one SSE `data:` payload
    fn parse_sse_data(data: &str) -> Vec<StreamChunk> {
        let data = data.trim();
        if data.is_empty() {
            return Vec::new();
        }
        if data == "[DONE]" {
            return vec![StreamChunk::MessageStop];
        }

        let chunk = match serde_json::from_str::<OpenAIStreamChunk>(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!(error = %e, "Skipping unparseable OpenAI stream payload");
                return Vec::new();
            }
        };

        let mut out = Vec::new();
        let usage = chunk
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens));

        if let Some(choice) = chunk.choices.into_iter().next() {
            if choice.delta.role.is_some() {
                out.push(StreamChunk::MessageStart {
                    id: chunk.id.clone(),
                    model: chunk.model.clone(),
                });
            }
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                out.push(StreamChunk::TextDelta { text });
            }
            for tc in choice.delta.tool_calls.unwrap_or_default() {
                let Some(function) = tc.function else {
                    continue;
                };
                if let Some(name) = function.name {
                    out.push(StreamChunk::FunctionCallStart { name });
                }
                if let Some(partial_json) = function.arguments.filter(|a| !a.is_empty()) {
                    out.push(StreamChunk::FunctionArgumentsDelta { partial_json });
                }
            }
            if choice.finish_reason.is_some() || usage.is_some() {
                out.push(StreamChunk::MessageDelta {
                    finish_reason: choice.finish_reason.map(|r| normalize_finish_reason(&r)),
                    usage,
                });
            }
        } else if usage.is_some() {
            out.push(StreamChunk::MessageDelta {
                finish_reason: None,
                usage,
            });
        }

        out
    }
}

/// OpenAI's `tool_calls` is reported as the legacy `function_call`
fn normalize_finish_reason(reason: &str) -> String {
    match reason {
        "tool_calls" => "function_call".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl ProviderClient for OpenAIClient {
    async fn send(&self, request: &ChatRequest) -> ProviderResult<NormalizedResponse> {
        let body = self.build_request(request, false);
        debug!(model = %body.model, tools = request.tools.len(), "Sending OpenAI request");

        let response = self.client.post(self.endpoint()).json(&body).send().await?;
        let response = error_for_status(self.config.provider.as_str(), response).await?;

        let api_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(Self::convert_response(api_response))
    }

    async fn send_streaming(&self, request: &ChatRequest) -> ProviderResult<ResponseStream> {
        let body = self.build_request(request, true);
        debug!(model = %body.model, "Sending OpenAI streaming request");

        let response = self.client.post(self.endpoint()).json(&body).send().await?;
        let response = error_for_status(self.config.provider.as_str(), response).await?;

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
        self.config.provider
    }
}

// API request/response types
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIChoice {
    #[serde(default)]
    message: OpenAIResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    /// Pre-`tools` API shape
    #[serde(default)]
    function_call: Option<OpenAIFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCall {
    function: OpenAIFunctionCall,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

// Streaming response types
#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIStreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamDelta {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAIStreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamToolCall {
    #[serde(default)]
    function: Option<OpenAIStreamFunction>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}
