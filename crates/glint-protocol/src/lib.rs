//! Glint Protocol - Shared types for the orchestration engine
//!
//! This crate defines the provider-agnostic shapes that every other crate
//! speaks:
//! - Requests and the per-provider chat request
//! - The normalized response every backend adapter must produce
//! - Tool definitions, function calls and tool results
//! - Streaming chunks and stream events

mod request;
mod response;
mod stream;
mod tools;
mod types;

pub use request::*;
pub use response::*;
pub use stream::*;
pub use tools::*;
pub use types::*;
