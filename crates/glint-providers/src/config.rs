//! Provider configuration

use glint_protocol::{ChatRequest, Provider};
use secrecy::SecretString;

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_OLLAMA_MODEL: &str = "llama3.1";
pub(crate) const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api";

/// Configuration for a model provider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    /// Upper bound on reply length; requests asking for more are capped
    pub max_tokens: Option<u32>,
    /// Pinned sampling temperature; overrides the request's when set
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAI,
            api_key: None,
            base_url: None,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            max_tokens: None,
            temperature: None,
            timeout_seconds: Some(120),
        }
    }
}

impl ProviderConfig {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            provider: Provider::OpenAI,
            api_key: Some(SecretString::from(api_key.into())),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            ..Default::default()
        }
    }

    pub fn anthropic(api_key: impl Into<String>) -> Self {
        Self {
            provider: Provider::Anthropic,
            api_key: Some(SecretString::from(api_key.into())),
            model: DEFAULT_ANTHROPIC_MODEL.to_string(),
            ..Default::default()
        }
    }

    pub fn ollama(model: impl Into<String>) -> Self {
        Self {
            provider: Provider::Ollama,
            model: model.into(),
            timeout_seconds: Some(300),
            ..Default::default()
        }
    }

    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self {
            provider: Provider::OpenRouter,
            api_key: Some(SecretString::from(api_key.into())),
            base_url: Some(OPENROUTER_BASE_URL.to_string()),
            ..Default::default()
        }
    }

    /// Defaults for a provider picked by name, without credentials
    pub fn for_provider(provider: Provider) -> Self {
        let model = match provider {
            Provider::Anthropic => DEFAULT_ANTHROPIC_MODEL,
            Provider::Ollama => DEFAULT_OLLAMA_MODEL,
            _ => DEFAULT_OPENAI_MODEL,
        };
        Self {
            provider,
            model: model.to_string(),
            base_url: (provider == Provider::OpenRouter).then(|| OPENROUTER_BASE_URL.to_string()),
            timeout_seconds: Some(if provider == Provider::Ollama { 300 } else { 120 }),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// A model is named and, where the backend needs one, a key is present
    pub fn is_configured(&self) -> bool {
        !self.model.trim().is_empty() && (self.api_key.is_some() || !self.provider.requires_api_key())
    }

    pub(crate) fn temperature_for(&self, request: &ChatRequest) -> f32 {
        self.temperature.unwrap_or(request.temperature)
    }

    pub(crate) fn max_tokens_for(&self, request: &ChatRequest) -> u32 {
        match self.max_tokens {
            Some(cap) => request.max_tokens.min(cap),
            None => request.max_tokens,
        }
    }
}
