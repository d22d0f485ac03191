//! Glint Tools - handlers the model can invoke
//!
//! Tools are registered by name together with the capabilities they need.
//! Only tools whose capabilities the host can currently service are
//! advertised to the model, and dispatch never fails: every outcome,
//! including a missing handler or a panicking one, becomes a [`ToolResult`].

pub mod builtins;
mod capability;
mod collaborators;
mod error;
mod handler;
mod hygiene;
pub mod memory;
mod registry;
mod summary;

pub use builtins::{builtin_definitions, register_builtin_tools};
pub use capability::{Capability, CapabilitySet};
pub use collaborators::{
    AnalysisData, AnalysisStore, BeatKind, CodeExecutor, Collaborators, ExecutionOutcome,
    FeaturePoint, PreferenceStore, Section, Segment, SegmentRef, Timeline, TimelineStore,
    WordTiming,
};
pub use error::ToolError;
pub use handler::{ToolFuture, ToolHandler};
pub use hygiene::repair_arguments;
pub use registry::ToolRegistry;
pub use summary::summarize;

pub use glint_protocol::{Arguments, ToolDefinition, ToolResult};
