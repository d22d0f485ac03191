//! Provider client trait

use async_trait::async_trait;
use futures::Stream;
use glint_protocol::{ChatRequest, NormalizedResponse, Provider, StreamEvent};
use std::pin::Pin;

use crate::ProviderError;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Text chunks in arrival order, then exactly one `Complete`
pub type ResponseStream = Pin<Box<dyn Stream<Item = ProviderResult<StreamEvent>> + Send>>;

/// A language-model backend
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Send a request and wait for the whole reply
    async fn send(&self, request: &ChatRequest) -> ProviderResult<NormalizedResponse>;

    /// Send a request and receive the reply incrementally
    async fn send_streaming(&self, request: &ChatRequest) -> ProviderResult<ResponseStream>;

    /// Whether the backend returns structured function calls itself
    fn supports_tools(&self) -> bool;

    fn supports_streaming(&self) -> bool {
        true
    }

    /// Get the model identifier
    fn model(&self) -> &str;

    fn provider(&self) -> Provider;
}
