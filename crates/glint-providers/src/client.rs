//! Provider client builder

use glint_protocol::Provider;
use std::sync::Arc;
use tracing::info;

use crate::config::OPENROUTER_BASE_URL;
use crate::{
    AnthropicClient, OllamaClient, OpenAIClient, ProviderClient, ProviderConfig, ProviderError,
};

/// Builder for creating provider clients
pub struct ClientBuilder {
    config: ProviderConfig,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ProviderConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ProviderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Arc<dyn ProviderClient>, ProviderError> {
        if self.config.model.trim().is_empty() {
            return Err(ProviderError::Configuration("model name is empty".into()));
        }
        info!(provider = %self.config.provider, model = %self.config.model, "Building provider client");

        match self.config.provider {
            Provider::OpenAI => Ok(Arc::new(OpenAIClient::new(self.config)?)),
            Provider::Anthropic => Ok(Arc::new(AnthropicClient::new(self.config)?)),
            Provider::Ollama => Ok(Arc::new(OllamaClient::new(self.config)?)),
            Provider::OpenRouter => {
                // OpenRouter uses the OpenAI-compatible API
                let mut config = self.config;
                config
                    .base_url
                    .get_or_insert_with(|| OPENROUTER_BASE_URL.to_string());
                Ok(Arc::new(OpenAIClient::new(config)?))
            }
            Provider::Custom => {
                if self.config.base_url.is_none() {
                    return Err(ProviderError::Configuration(
                        "custom provider needs a base_url".into(),
                    ));
                }
                Ok(Arc::new(OpenAIClient::new(self.config)?))
            }
        }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
