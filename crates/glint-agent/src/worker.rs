//! The background task that runs one request chain
//!
//! A chain is the user's request plus any corrective retries. Retries run in
//! the same task under the same ticket, so the busy flag and cancel flag
//! cover the whole chain.

use crate::config::EngineConfig;
use crate::control::{CoordinatorState, WorkerTicket};
use crate::error::EngineError;
use crate::events::{EngineEvent, EventSender, StructuredReply};
use crate::prompts::{compose_system_message, RetryContext};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use glint_interpret::{extract_text, function_call, interpret};
use glint_protocol::{
    Arguments, ChatRequest, NormalizedResponse, Request, StreamEvent, ToolResult,
};
use glint_providers::{ProviderClient, ProviderError};
use glint_telemetry::UsageTracker;
use glint_tools::{summarize, CapabilitySet, Collaborators, ToolRegistry};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

enum Outcome {
    Finished,
    Retry(Request),
}

/// Running totals for one chain
struct Chain {
    original_prompt: String,
    tokens: u64,
    cost: f64,
}

/// A tool call that has been dispatched, or failed before dispatch
struct ToolOutcome {
    name: String,
    arguments: Arguments,
    result: ToolResult,
    model_text: String,
}

pub(crate) struct Worker {
    pub client: Arc<dyn ProviderClient>,
    pub registry: Arc<ToolRegistry>,
    pub collaborators: Collaborators,
    pub capabilities: CapabilitySet,
    pub usage: Arc<UsageTracker>,
    pub config: EngineConfig,
    pub events: EventSender,
    pub ticket: WorkerTicket,
}

impl Worker {
    pub async fn run(self, request: Request) {
        let mut chain = Chain {
            original_prompt: request.prompt.clone(),
            tokens: 0,
            cost: 0.0,
        };
        let mut current = request;

        loop {
            match self.attempt(&current, &mut chain).await {
                Ok(Outcome::Finished) => break,
                Ok(Outcome::Retry(next)) => {
                    self.ticket.set_state(CoordinatorState::Retrying);
                    current = next;
                }
                Err(EngineError::Interrupted) => {
                    debug!(request_id = %current.id, "Worker observed interrupt");
                    break;
                }
                Err(e) => {
                    error!(request_id = %current.id, error = %e, "Request failed");
                    self.emit(EngineEvent::Error {
                        message: e.to_string(),
                    });
                    break;
                }
            }
        }

        self.ticket.finish();
    }

    async fn attempt(&self, request: &Request, chain: &mut Chain) -> Result<Outcome, EngineError> {
        self.checkpoint()?;
        self.ticket.set_state(CoordinatorState::Dispatched);
        self.emit(EngineEvent::ThinkingStarted);

        let system_message = compose_system_message(
            request.system_message.as_deref(),
            self.config.system_message.as_deref(),
            self.collaborators.preferences.as_deref(),
            request.song_id.as_deref(),
        );
        let tools = self.registry.available_definitions(&self.capabilities);
        let chat = ChatRequest::from_request(request, tools).with_system_message(system_message);

        debug!(
            request_id = %request.id,
            retry = request.retry_count,
            tools = chat.tools.len(),
            stream = request.stream,
            "Dispatching request"
        );

        let started = Utc::now();
        let response = self.call_model(request, &chat).await?;
        // Result of a call that was interrupted while in flight is discarded
        self.checkpoint()?;

        let text = extract_text(&response);
        let allow_text_fallback = request.tools_enabled && !self.client.supports_tools();
        let call = if request.tools_enabled {
            function_call(&response, allow_text_fallback)
        } else {
            Ok(None)
        };

        let outcome = match call {
            Ok(None) => {
                self.commit_usage(&response, started, &chat, &text, chain);
                self.publish_text(text, chain);
                return Ok(Outcome::Finished);
            }
            Ok(Some(call)) => {
                self.ticket.set_state(CoordinatorState::AwaitingTool);
                info!(request_id = %request.id, tool = %call.name, "Dispatching tool call");

                let result = self
                    .registry
                    .dispatch(&call.name, call.arguments.clone())
                    .await;
                self.checkpoint()?;

                ToolOutcome {
                    name: call.name,
                    arguments: call.arguments,
                    result,
                    model_text: text,
                }
            }
            Err(e) => {
                let name = e.name.clone();
                let error = EngineError::from(e);
                debug!(request_id = %request.id, error = %error, "Malformed tool call");
                ToolOutcome {
                    name,
                    arguments: Arguments::new(),
                    result: ToolResult::error(error.to_string()),
                    model_text: text,
                }
            }
        };

        self.commit_usage(&response, started, &chat, &outcome.model_text, chain);
        Ok(self.conclude_tool(request, outcome, chain))
    }

    async fn call_model(
        &self,
        request: &Request,
        chat: &ChatRequest,
    ) -> Result<NormalizedResponse, EngineError> {
        if !(request.stream && self.client.supports_streaming()) {
            return Ok(self.client.send(chat).await?);
        }

        let mut stream = self.client.send_streaming(chat).await?;
        while let Some(event) = stream.next().await {
            self.checkpoint()?;
            match event? {
                StreamEvent::Chunk(text) if text.is_empty() => {}
                StreamEvent::Chunk(text) => self.emit(EngineEvent::ResponseChunk { text }),
                StreamEvent::Complete(response) => return Ok(response),
            }
        }

        Err(ProviderError::StreamError("stream ended without a final response".into()).into())
    }

    fn conclude_tool(&self, request: &Request, outcome: ToolOutcome, chain: &Chain) -> Outcome {
        let ToolOutcome {
            name,
            arguments,
            result,
            model_text,
        } = outcome;

        self.emit(EngineEvent::FunctionCalled {
            name: name.clone(),
            arguments: arguments.clone(),
            result: result.clone(),
        });

        if result.is_failure() {
            let retry = RetryContext {
                original_prompt: chain.original_prompt.clone(),
                function_name: name.clone(),
                error: result
                    .error_message()
                    .unwrap_or_else(|| "the tool reported failure".to_string()),
                retry_count: request.retry_count,
                max_retries: self.config.max_retries,
            };

            if retry.can_retry() {
                let available = self.registry.available_names(&self.capabilities);
                info!(
                    request_id = %request.id,
                    tool = %name,
                    error = %retry.error,
                    retry = request.retry_count + 1,
                    "Retrying after tool failure"
                );
                return Outcome::Retry(request.retry(retry.corrective_prompt(&available)));
            }

            let failure = EngineError::ToolExecution {
                tool: name.clone(),
                message: retry.error,
            };
            warn!(request_id = %request.id, error = %failure, "Retries exhausted");
        }

        let summary = summarize(&name, &result);
        self.emit(EngineEvent::UsageUpdated {
            tokens: chain.tokens,
            cost: chain.cost,
        });
        self.emit(EngineEvent::ResponseReceived {
            text: summary.clone(),
            structured: StructuredReply::FunctionCall {
                name,
                arguments,
                result,
                summary,
                model_text: Some(model_text).filter(|t| !t.trim().is_empty()),
                retries: request.retry_count,
            },
        });
        Outcome::Finished
    }

    /// Record usage for an attempt that made it past its last checkpoint
    fn commit_usage(
        &self,
        response: &NormalizedResponse,
        started: DateTime<Utc>,
        chat: &ChatRequest,
        text: &str,
        chain: &mut Chain,
    ) {
        // Under the ticket lock so an interrupt cannot land between check and record
        self.ticket.publish(|| {
            let (tokens, cost) = self.usage.record(
                self.client.provider().as_str(),
                self.client.model(),
                response,
            );
            self.usage
                .record_performance(started, Utc::now(), chat.prompt.len(), text.len(), tokens);
            chain.tokens += tokens;
            chain.cost += cost;
        });
    }

    fn publish_text(&self, text: String, chain: &Chain) {
        let interpretation = interpret(&text);

        if let Some(ambiguity) = &interpretation.ambiguity {
            self.emit(EngineEvent::AmbiguityDetected {
                prompt: chain.original_prompt.clone(),
                suggestions: ambiguity.suggestions.clone(),
            });
        }
        self.emit(EngineEvent::UsageUpdated {
            tokens: chain.tokens,
            cost: chain.cost,
        });
        self.emit(EngineEvent::ResponseReceived {
            text,
            structured: StructuredReply::Text { interpretation },
        });
    }

    fn checkpoint(&self) -> Result<(), EngineError> {
        if self.ticket.is_live() {
            Ok(())
        } else {
            Err(EngineError::Interrupted)
        }
    }

    fn emit(&self, event: EngineEvent) {
        self.ticket.publish(|| self.events.emit(event));
    }
}
