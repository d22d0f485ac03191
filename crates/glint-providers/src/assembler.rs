//! Stream assembly
//!
//! Provider parsers decode their wire format into [`StreamChunk`]s. The
//! [`StreamAssembler`] folds those into the final [`NormalizedResponse`] while
//! handing text deltas straight through, so the assembled text is exactly the
//! concatenation of the forwarded chunks.

use futures::{Stream, StreamExt};
use glint_protocol::{NormalizedResponse, RawFunctionCall, StreamChunk, StreamEvent, Usage};
use serde_json::Value;
use tracing::{debug, error};

use crate::{ProviderError, ProviderResult, ResponseStream};

pub struct StreamAssembler {
    text: String,
    function_name: Option<String>,
    arguments: String,
    /// A second native call started; its deltas are dropped
    skipping_call: bool,
    message_id: Option<String>,
    model: String,
    finish_reason: Option<String>,
    usage: Option<Usage>,
    finished: bool,
    recover_calls: bool,
}

impl StreamAssembler {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            function_name: None,
            arguments: String::new(),
            skipping_call: false,
            message_id: None,
            model: model.into(),
            finish_reason: None,
            usage: None,
            finished: false,
            recover_calls: false,
        }
    }

    /// Recover a function call from the text when no native call arrives
    pub fn with_call_recovery(mut self, enabled: bool) -> Self {
        self.recover_calls = enabled;
        self
    }

    /// Apply one chunk; returns text to forward to the caller
    pub fn push(&mut self, chunk: StreamChunk) -> ProviderResult<Option<String>> {
        match chunk {
            StreamChunk::MessageStart { id, model } => {
                self.message_id = Some(id);
                if !model.is_empty() {
                    self.model = model;
                }
                Ok(None)
            }
            StreamChunk::TextDelta { text } => {
                if text.is_empty() {
                    return Ok(None);
                }
                self.text.push_str(&text);
                Ok(Some(text))
            }
            StreamChunk::FunctionCallStart { name } => {
                if self.function_name.is_some() {
                    debug!(%name, "Ignoring additional function call in stream");
                    self.skipping_call = true;
                } else {
                    self.function_name = Some(name);
                }
                Ok(None)
            }
            StreamChunk::FunctionArgumentsDelta { partial_json } => {
                if !self.skipping_call {
                    self.arguments.push_str(&partial_json);
                }
                Ok(None)
            }
            StreamChunk::MessageDelta {
                finish_reason,
                usage,
            } => {
                if finish_reason.is_some() {
                    self.finish_reason = finish_reason;
                }
                if let Some(update) = usage {
                    self.usage = Some(merge_usage(self.usage, update));
                }
                Ok(None)
            }
            StreamChunk::MessageStop => {
                self.finished = true;
                Ok(None)
            }
            StreamChunk::Ping => Ok(None),
            StreamChunk::Error { message } => {
                error!(%message, "Stream error");
                Err(ProviderError::StreamError(message))
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn finish(self) -> NormalizedResponse {
        let mut function_call = self
            .function_name
            .map(|name| RawFunctionCall::new(name, self.arguments));

        if function_call.is_none() && self.recover_calls {
            function_call = recover_call(&self.text);
        }

        let finish_reason = if function_call.is_some() {
            Some("function_call".to_string())
        } else {
            self.finish_reason.or_else(|| Some("stop".to_string()))
        };

        NormalizedResponse::assistant(
            self.message_id
                .unwrap_or_else(|| format!("stream-{}", uuid::Uuid::new_v4())),
            self.model,
            (!self.text.is_empty()).then_some(self.text),
            function_call,
            finish_reason,
            self.usage.unwrap_or_else(Usage::zero),
        )
    }
}

/// Later usage reports fill in whichever counters they carry
fn merge_usage(current: Option<Usage>, update: Usage) -> Usage {
    let base = current.unwrap_or_default();
    let prompt = if update.prompt_tokens > 0 {
        update.prompt_tokens
    } else {
        base.prompt_tokens
    };
    let completion = if update.completion_tokens > 0 {
        update.completion_tokens
    } else {
        base.completion_tokens
    };
    Usage::new(prompt, completion)
}

/// Function call written as text, re-encoded as a native one
pub(crate) fn recover_call(text: &str) -> Option<RawFunctionCall> {
    let call = glint_interpret::extract_function_call(text)?;
    let arguments = Value::Object(call.arguments).to_string();
    Some(RawFunctionCall::new(call.name, arguments))
}

/// Drive a chunk stream through an assembler.
///
/// Text chunks are forwarded as they arrive; the final item is the assembled
/// response. The first error ends the stream.
pub(crate) fn assemble<S>(chunks: S, assembler: StreamAssembler) -> ResponseStream
where
    S: Stream<Item = ProviderResult<StreamChunk>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut assembler = assembler;
        let mut chunks = Box::pin(chunks);

        while let Some(item) = chunks.next().await {
            let chunk = match item {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            match assembler.push(chunk) {
                Ok(Some(text)) => yield Ok(StreamEvent::Chunk(text)),
                Ok(None) => {}
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
            if assembler.is_finished() {
                break;
            }
        }

        yield Ok(StreamEvent::Complete(assembler.finish()));
    })
}
