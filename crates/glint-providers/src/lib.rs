//! Glint Providers - Model client implementations
//!
//! Every client turns its backend's wire format into a
//! [`NormalizedResponse`](glint_protocol::NormalizedResponse):
//! - OpenAI (and OpenAI-compatible endpoints such as OpenRouter)
//! - Anthropic (Claude)
//! - Ollama (local models, no native tool calling)

mod anthropic;
mod assembler;
mod client;
mod config;
mod error;
mod ollama;
mod openai;
mod response_handling;
mod traits;

pub use anthropic::AnthropicClient;
pub use assembler::StreamAssembler;
pub use client::ClientBuilder;
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;
pub use response_handling::{error_for_status, extract_retry_after};
pub use secrecy::SecretString;
pub use traits::{ProviderClient, ProviderResult, ResponseStream};
