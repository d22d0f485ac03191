//! Glint Agent - the request lifecycle
//!
//! [`RequestCoordinator`] owns one request at a time. A request is sent to
//! the configured provider client, the reply is interpreted, a function call
//! is dispatched through the tool registry, and a failed call is retried
//! with a corrective prompt inside the same background task. Everything the
//! caller needs to observe arrives as an [`EngineEvent`].

mod config;
mod control;
mod coordinator;
mod error;
mod events;
mod prompts;
mod worker;

pub use config::EngineConfig;
pub use control::CoordinatorState;
pub use coordinator::RequestCoordinator;
pub use error::EngineError;
pub use events::{EngineEvent, EventSender, EventStream, StructuredReply};
pub use prompts::{compose_system_message, RetryContext, DEFAULT_SYSTEM_PROMPT};
