//! Coordinator configuration

use std::time::Duration;

/// Tool-failure retries allowed per request chain
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// How long `interrupt` waits for the worker to unwind
pub const DEFAULT_INTERRUPT_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle settings for [`RequestCoordinator`](crate::RequestCoordinator)
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub max_retries: u32,
    pub interrupt_timeout: Duration,
    /// Used when a request carries no system message of its own
    pub system_message: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            interrupt_timeout: DEFAULT_INTERRUPT_TIMEOUT,
            system_message: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_interrupt_timeout(mut self, timeout: Duration) -> Self {
        self.interrupt_timeout = timeout;
        self
    }

    pub fn with_system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = Some(system_message.into());
        self
    }
}
