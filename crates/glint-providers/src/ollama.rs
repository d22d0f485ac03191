//! Ollama client implementation for local LLMs
//!
//! Ollama has no native function calling here. Tool definitions are described
//! in the system message and any call the model writes as text is recovered
//! with the interpreter cascade, so callers see the same response shape as
//! for the hosted providers.

use async_trait::async_trait;
use futures::StreamExt;
use glint_protocol::{
    ChatRequest, NormalizedResponse, Provider, StreamChunk, ToolDefinition, Usage,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::assembler::{assemble, recover_call, StreamAssembler};
use crate::response_handling::error_for_status;
use crate::{ProviderClient, ProviderConfig, ProviderError, ProviderResult, ResponseStream};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama API client for local LLMs
pub struct OllamaClient {
    client: Client,
    config: ProviderConfig,
}

impl OllamaClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        // Longer timeout for local models
        let timeout = Duration::from_secs(config.timeout_seconds.unwrap_or(300));
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{}/api/chat", base)
    }

    fn build_request(&self, request: &ChatRequest, stream: bool) -> OllamaRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_message(request) {
            messages.push(OllamaMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(OllamaMessage {
            role: "user",
            content: request.prompt.clone(),
        });

        OllamaRequest {
            model: self.config.model.clone(),
            messages,
            stream,
            options: OllamaOptions {
                num_predict: self.config.max_tokens_for(request),
                temperature: self.config.temperature_for(request),
            },
        }
    }

    /// Calls are only recovered from the text when tools were offered
    fn convert_response(response: OllamaResponse, recover_calls: bool) -> NormalizedResponse {
        let text = response.message.map(|m| m.content).unwrap_or_default();
        let function_call = if recover_calls { recover_call(&text) } else { None };
        let finish_reason = if function_call.is_some() {
            "function_call".to_string()
        } else {
            response.done_reason.unwrap_or_else(|| "stop".to_string())
        };

        NormalizedResponse::assistant(
            format!("ollama-{}", uuid::Uuid::new_v4()),
            response.model,
            (!text.is_empty()).then_some(text),
            function_call,
            Some(finish_reason),
            Usage::new(
                response.prompt_eval_count.unwrap_or(0),
                response.eval_count.unwrap_or(0),
            ),
        )
    }

    /// Decode one NDJSON line
    fn parse_stream_line(line: &str) -> Vec<StreamChunk> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }

        let response = match serde_json::from_str::<OllamaResponse>(line) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Skipping unparseable Ollama stream line");
                return Vec::new();
            }
        };

        if let Some(message) = response.error {
            return vec![StreamChunk::Error { message }];
        }

        let mut chunks = Vec::new();
        if let Some(text) = response.message.map(|m| m.content).filter(|t| !t.is_empty()) {
            chunks.push(StreamChunk::TextDelta { text });
        }
        if response.done {
            chunks.push(StreamChunk::MessageDelta {
                finish_reason: Some(response.done_reason.unwrap_or_else(|| "stop".to_string())),
                usage: Some(Usage::new(
                    response.prompt_eval_count.unwrap_or(0),
                    response.eval_count.unwrap_or(0),
                )),
            });
            chunks.push(StreamChunk::MessageStop);
        }
        chunks
    }
}

/// System message with the tool catalogue appended
fn system_message(request: &ChatRequest) -> Option<String> {
    let base = request.system_message.clone().filter(|s| !s.is_empty());
    if request.tools.is_empty() {
        return base;
    }

    let mut out = base.map(|s| s + "\n\n").unwrap_or_default();
    out.push_str(&describe_tools(&request.tools));
    Some(out)
}

fn describe_tools(tools: &[ToolDefinition]) -> String {
    let mut out = String::from(
        "You can call one of these tools by replying with a single call written as \
         name(key=value, ...):\n",
    );
    for tool in tools {
        let required = tool.parameters.required_fields();
        let params: Vec<String> = tool
            .parameters
            .property_names()
            .into_iter()
            .map(|name| {
                if required.contains(&name) {
                    name
                } else {
                    format!("{}?", name)
                }
            })
            .collect();
        out.push_str(&format!(
            "- {}({}): {}\n",
            tool.name,
            params.join(", "),
            tool.description
        ));
    }
    out
}

#[async_trait]
impl ProviderClient for OllamaClient {
    async fn send(&self, request: &ChatRequest) -> ProviderResult<NormalizedResponse> {
        let body = self.build_request(request, false);
        debug!(model = %body.model, "Sending Ollama request");

        let response = self.client.post(self.endpoint()).json(&body).send().await?;
        let response = error_for_status("ollama", response).await?;

        let api_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        if let Some(message) = api_response.error {
            return Err(ProviderError::InvalidResponse(message));
        }
        Ok(Self::convert_response(api_response, !request.tools.is_empty()))
    }

    async fn send_streaming(&self, request: &ChatRequest) -> ProviderResult<ResponseStream> {
        let body = self.build_request(request, true);
        debug!(model = %body.model, "Sending Ollama streaming request");

        let response = self.client.post(self.endpoint()).json(&body).send().await?;
        let response = error_for_status("ollama", response).await?;

        let mut bytes = Box::pin(response.bytes_stream());
        let chunks = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(item) = bytes.next().await {
                match item {
                    Ok(data) => {
                        buffer.extend_from_slice(&data);
                        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                            let line: Vec<u8> = buffer.drain(..=pos).collect();
                            for chunk in Self::parse_stream_line(&String::from_utf8_lossy(&line)) {
                                yield Ok(chunk);
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(ProviderError::StreamError(e.to_string()));
                        return;
                    }
                }
            }
            for chunk in Self::parse_stream_line(&String::from_utf8_lossy(&buffer)) {
                yield Ok(chunk);
            }
        };

        let assembler = StreamAssembler::new(self.config.model.clone())
            .with_call_recovery(!request.tools.is_empty());
        Ok(assemble(chunks, assembler))
    }

    fn supports_tools(&self) -> bool {
        false
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn provider(&self) -> Provider {
        Provider::Ollama
    }
}

// API request/response types
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    message: Option<OllamaResponseMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}
