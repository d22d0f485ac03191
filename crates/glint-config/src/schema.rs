use glint_protocol::Provider;
use glint_telemetry::{PricingTable, TelemetryConfig};
use serde::{Deserialize, Serialize};
use std::env;

/// Main Glint configuration
///
/// Configuration is loaded from (in priority order):
/// 1. `glint.jsonc` - JSON with comments
/// 2. `glint.json` - Standard JSON
/// 3. `glint.yml` / `glint.yaml` - YAML format
///
/// Hidden variants (`.glint.*`) and `~/.config/glint/` are checked as well.
/// Every section is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlintConfig {
    #[serde(default)]
    pub provider: ProviderSettings,

    #[serde(default)]
    pub engine: EngineSettings,

    /// Price overrides merged over the built-in table
    #[serde(default = "PricingTable::empty")]
    pub pricing: PricingTable,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Default for GlintConfig {
    fn default() -> Self {
        Self {
            provider: ProviderSettings::default(),
            engine: EngineSettings::default(),
            pricing: PricingTable::empty(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Which model backend to talk to
///
/// # Example
///
/// ```yaml
/// provider:
///   name: anthropic
///   model: claude-sonnet-4-20250514
///   api_key: ${ANTHROPIC_API_KEY}
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub name: Provider,

    /// Model name; the provider's default when omitted
    #[serde(default)]
    pub model: Option<String>,

    /// Falls back to the provider's usual environment variable
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl ProviderSettings {
    /// Environment variable consulted when no key is configured
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self.name {
            Provider::OpenAI => Some("OPENAI_API_KEY"),
            Provider::Anthropic => Some("ANTHROPIC_API_KEY"),
            Provider::OpenRouter => Some("OPENROUTER_API_KEY"),
            Provider::Ollama | Provider::Custom => None,
        }
    }

    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty() && !k.starts_with("${"))
            .or_else(|| {
                self.api_key_env()
                    .and_then(|var| env::var(var).ok())
                    .filter(|k| !k.trim().is_empty())
            })
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Request lifecycle settings
///
/// # Example
///
/// ```yaml
/// engine:
///   max_retries: 2
///   interrupt_timeout_ms: 2000
///   streaming: true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Corrective re-submissions after a failed tool call (default: 2)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// How long `interrupt` waits for the worker (default: 2000)
    #[serde(default = "default_interrupt_timeout_ms")]
    pub interrupt_timeout_ms: u64,

    #[serde(default)]
    pub streaming: bool,

    #[serde(default = "default_true")]
    pub tools_enabled: bool,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Replaces the built-in choreography prompt
    #[serde(default)]
    pub system_message: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            interrupt_timeout_ms: default_interrupt_timeout_ms(),
            streaming: false,
            tools_enabled: true,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_message: None,
        }
    }
}

fn default_max_retries() -> u32 {
    2
}

fn default_interrupt_timeout_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

fn default_temperature() -> f32 {
    glint_protocol::DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    glint_protocol::DEFAULT_MAX_TOKENS
}
