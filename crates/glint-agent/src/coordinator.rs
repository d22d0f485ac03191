//! Request coordinator

use crate::config::EngineConfig;
use crate::control::{CoordinatorState, RequestControl};
use crate::error::EngineError;
use crate::events::{EngineEvent, EventSender, EventStream};
use crate::worker::Worker;
use glint_protocol::Request;
use glint_providers::ProviderClient;
use glint_telemetry::{UsageSnapshot, UsageTracker};
use glint_tools::{CapabilitySet, Collaborators, ToolRegistry};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Accepts one request at a time and runs it on a background task.
///
/// Observers read [`EngineEvent`]s from the stream returned by
/// [`take_events`](Self::take_events). `submit` returns as soon as the worker
/// is spawned; the terminal event for the chain is always the last one it
/// emits.
pub struct RequestCoordinator {
    client: RwLock<Option<Arc<dyn ProviderClient>>>,
    registry: Arc<ToolRegistry>,
    collaborators: Collaborators,
    capabilities: CapabilitySet,
    usage: Arc<UsageTracker>,
    config: EngineConfig,
    control: Arc<RequestControl>,
    events: EventSender,
    stream: Mutex<Option<EventStream>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RequestCoordinator {
    /// Tools are advertised according to what `collaborators` can service
    pub fn new(registry: ToolRegistry, collaborators: Collaborators) -> Self {
        let (events, stream) = EventStream::channel();
        let capabilities = collaborators.capabilities();
        Self {
            client: RwLock::new(None),
            registry: Arc::new(registry),
            collaborators,
            capabilities,
            usage: Arc::new(UsageTracker::default()),
            config: EngineConfig::default(),
            control: RequestControl::new(),
            events,
            stream: Mutex::new(Some(stream)),
            worker: Mutex::new(None),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_client(self, client: Arc<dyn ProviderClient>) -> Self {
        self.configure(client);
        self
    }

    pub fn with_usage_tracker(mut self, usage: Arc<UsageTracker>) -> Self {
        self.usage = usage;
        self
    }

    /// The event stream. Only the first caller gets it.
    pub fn take_events(&self) -> Option<EventStream> {
        self.stream.lock().take()
    }

    /// Install or replace the provider client. A request already in flight
    /// keeps the client it started with.
    pub fn configure(&self, client: Arc<dyn ProviderClient>) {
        info!(
            provider = client.provider().as_str(),
            model = client.model(),
            "Provider client configured"
        );
        *self.client.write() = Some(client);
    }

    pub fn is_configured(&self) -> bool {
        self.configured_client().is_some()
    }

    fn configured_client(&self) -> Option<Arc<dyn ProviderClient>> {
        self.client
            .read()
            .as_ref()
            .filter(|client| !client.model().trim().is_empty())
            .cloned()
    }

    /// Start a request chain. Must be called from within a tokio runtime.
    ///
    /// Returns false, after emitting an error event, when no client is
    /// configured or another chain is in flight. Retries never come through
    /// here; they continue inside the running chain.
    pub fn submit(&self, request: Request) -> bool {
        let Some(client) = self.configured_client() else {
            self.reject("no provider client with a model is configured");
            return false;
        };
        let Some(ticket) = self.control.begin() else {
            self.reject("a request is already being processed");
            return false;
        };

        info!(
            request_id = %request.id,
            provider = client.provider().as_str(),
            model = client.model(),
            "Request accepted"
        );

        let worker = Worker {
            client,
            registry: Arc::clone(&self.registry),
            collaborators: self.collaborators.clone(),
            capabilities: self.capabilities.clone(),
            usage: Arc::clone(&self.usage),
            config: self.config.clone(),
            events: self.events.clone(),
            ticket,
        };
        *self.worker.lock() = Some(tokio::spawn(worker.run(request)));
        true
    }

    fn reject(&self, reason: &str) {
        let error = EngineError::Configuration(reason.to_string());
        warn!(error = %error, "Request rejected");
        self.events.emit(EngineEvent::Error {
            message: error.to_string(),
        });
    }

    /// Cancel the in-flight chain, if any.
    ///
    /// Emits `Interrupted`, waits up to the configured timeout for the worker
    /// to stop, then returns to Idle whether or not it did. Does nothing and
    /// emits nothing when idle.
    pub async fn interrupt(&self) {
        let events = &self.events;
        if !self
            .control
            .cancel_current(|| events.emit(EngineEvent::Interrupted))
        {
            return;
        }
        info!("Interrupt requested");

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            match tokio::time::timeout(self.config.interrupt_timeout, handle).await {
                Ok(_) => debug!("Worker stopped after interrupt"),
                Err(_) => warn!(
                    timeout_ms = self.config.interrupt_timeout.as_millis() as u64,
                    "Worker still running after interrupt, resetting anyway"
                ),
            }
        }
        self.control.reset();
    }

    pub fn state(&self) -> CoordinatorState {
        self.control.state()
    }

    pub fn is_busy(&self) -> bool {
        self.control.is_busy()
    }

    /// Resolves once no chain is in flight
    pub async fn wait_idle(&self) {
        let mut state = self.control.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = state.wait_for(|s| s.is_idle()).await;
    }

    pub fn usage(&self) -> UsageSnapshot {
        self.usage.snapshot()
    }

    pub fn usage_tracker(&self) -> &Arc<UsageTracker> {
        &self.usage
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl std::fmt::Debug for RequestCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCoordinator")
            .field("configured", &self.is_configured())
            .field("state", &self.state())
            .field("capabilities", &self.capabilities)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
