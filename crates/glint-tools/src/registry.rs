//! Tool registry for capability-gated dispatch

use futures::FutureExt;
use glint_protocol::{Arguments, ToolDefinition, ToolResult};
use indexmap::IndexMap;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::hygiene::repair_arguments;
use crate::{CapabilitySet, ToolHandler};

struct Registration {
    requires: CapabilitySet,
    handler: Arc<dyn ToolHandler>,
}

/// Named handlers plus the schema catalog advertised to the model
#[derive(Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Registration>,
    definitions: IndexMap<String, ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. A later registration under the same name wins.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        requires: CapabilitySet,
        handler: impl ToolHandler + 'static,
    ) {
        let name = name.into();
        let previous = self.handlers.insert(
            name.clone(),
            Registration {
                requires,
                handler: Arc::new(handler),
            },
        );
        if previous.is_some() {
            debug!(tool = %name, "Replaced tool handler");
        }
    }

    /// Add or replace a schema in the catalog
    pub fn define(&mut self, definition: ToolDefinition) {
        self.definitions.insert(definition.name.clone(), definition);
    }

    /// Definitions that have a handler and whose capabilities are all offered
    pub fn available_definitions(&self, capabilities: &CapabilitySet) -> Vec<ToolDefinition> {
        self.definitions
            .values()
            .filter(|definition| {
                self.handlers
                    .get(&definition.name)
                    .is_some_and(|reg| capabilities.satisfies(&reg.requires))
            })
            .cloned()
            .collect()
    }

    /// Names of the tools that would be advertised for `capabilities`
    pub fn available_names(&self, capabilities: &CapabilitySet) -> Vec<String> {
        self.available_definitions(capabilities)
            .into_iter()
            .map(|d| d.name)
            .collect()
    }

    /// Run a handler. Every outcome is folded into a result:
    /// a missing handler, a handler error and a panic all become `{error}`.
    pub async fn dispatch(&self, name: &str, mut arguments: Arguments) -> ToolResult {
        let Some(registration) = self.handlers.get(name) else {
            warn!(tool = %name, "No handler registered");
            return ToolResult::error(format!("no handler for {}", name));
        };

        repair_arguments(&mut arguments);
        debug!(tool = %name, args = arguments.len(), "Dispatching tool");

        let handler = Arc::clone(&registration.handler);
        let future = match std::panic::catch_unwind(AssertUnwindSafe(|| handler.call(arguments)))
        {
            Ok(future) => future,
            Err(payload) => return panicked(name, payload),
        };

        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                debug!(tool = %name, error = %e, "Tool returned an error");
                ToolResult::error(e.to_string())
            }
            Err(payload) => panicked(name, payload),
        }
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Names with a registered handler, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn definition(&self, name: &str) -> Option<&ToolDefinition> {
        self.definitions.get(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

fn panicked(name: &str, payload: Box<dyn Any + Send>) -> ToolResult {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    warn!(tool = %name, panic = %message, "Tool handler panicked");
    ToolResult::error(format!("{} panicked: {}", name, message))
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("handlers", &self.names())
            .field("definitions", &self.definitions.keys().collect::<Vec<_>>())
            .finish()
    }
}
