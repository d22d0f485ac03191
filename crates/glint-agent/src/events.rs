//! Caller-visible events
//!
//! The coordinator never touches a UI. Every state change it wants an
//! observer to see goes through an [`EventSender`] and comes out of the
//! matching [`EventStream`] in emission order.

use futures::Stream;
use glint_interpret::Interpretation;
use glint_protocol::{Arguments, ToolResult};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    ThinkingStarted,

    /// Terminal event for a successful request chain
    ResponseReceived {
        text: String,
        structured: StructuredReply,
    },

    /// Terminal event for a failed request
    Error { message: String },

    Interrupted,

    ResponseChunk { text: String },

    FunctionCalled {
        name: String,
        arguments: Arguments,
        result: ToolResult,
    },

    UsageUpdated { tokens: u64, cost: f64 },

    AmbiguityDetected {
        prompt: String,
        suggestions: Vec<String>,
    },
}

impl EngineEvent {
    /// Whether this event ends a request chain
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ResponseReceived { .. } | Self::Error { .. } | Self::Interrupted
        )
    }
}

/// Structured payload attached to a final response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuredReply {
    /// Plain text reply with whatever the interpreter found in it
    Text {
        #[serde(flatten)]
        interpretation: Interpretation,
    },

    /// The reply was a function call; `result` may be a failure
    FunctionCall {
        name: String,
        arguments: Arguments,
        result: ToolResult,
        summary: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_text: Option<String>,
        retries: u32,
    },
}

/// Stream of engine events
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<EngineEvent>,
}

impl EventStream {
    pub fn new(receiver: mpsc::UnboundedReceiver<EngineEvent>) -> Self {
        Self { receiver }
    }

    /// Create a connected sender and stream
    pub fn channel() -> (EventSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSender { sender: tx }, Self::new(rx))
    }

    /// Next event without waiting
    pub fn try_next(&mut self) -> Option<EngineEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for EventStream {
    type Item = EngineEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}

/// Sender half held by the coordinator and its worker
#[derive(Clone)]
pub struct EventSender {
    sender: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSender {
    /// Send an event. A dropped observer is not an error for the engine.
    pub fn emit(&self, event: EngineEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("event observer dropped");
        }
    }

    /// Check if the receiver has been dropped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
