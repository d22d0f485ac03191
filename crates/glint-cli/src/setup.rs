//! Turning configuration and flags into a running engine

use anyhow::{anyhow, Context, Result};
use glint_agent::{EngineConfig, RequestCoordinator};
use glint_config::{EngineSettings, GlintConfig, ProviderSettings};
use glint_protocol::{Provider, Request};
use glint_providers::{ClientBuilder, ProviderConfig};
use glint_telemetry::{PricingTable, UsageTracker};
use glint_tools::memory::{InMemoryTimeline, StaticAnalysis};
use glint_tools::{register_builtin_tools, AnalysisData, Collaborators, ToolRegistry};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::commands::Cli;

/// Command-line flags win over the config file
pub fn apply_overrides(config: &mut GlintConfig, cli: &Cli) -> Result<()> {
    if let Some(provider) = &cli.provider {
        let name: Provider = provider.parse().map_err(|e: String| anyhow!(e))?;
        if name != config.provider.name {
            // Settings for another backend do not carry over
            config.provider = ProviderSettings {
                name,
                ..Default::default()
            };
        }
    }
    if let Some(model) = &cli.model {
        config.provider.model = Some(model.clone());
    }
    if cli.stream {
        config.engine.streaming = true;
    }
    if cli.no_tools {
        config.engine.tools_enabled = false;
    }
    Ok(())
}

pub fn provider_config(settings: &ProviderSettings) -> ProviderConfig {
    let mut config = ProviderConfig::for_provider(settings.name);
    if let Some(model) = settings.model.as_deref().filter(|m| !m.trim().is_empty()) {
        config = config.with_model(model);
    }
    if let Some(key) = settings.resolved_api_key() {
        config = config.with_api_key(key);
    }
    if let Some(url) = &settings.base_url {
        config = config.with_base_url(url.clone());
    }
    if let Some(timeout) = settings.timeout_seconds {
        config = config.with_timeout(timeout);
    }
    config
}

pub fn engine_config(settings: &EngineSettings) -> EngineConfig {
    let mut config = EngineConfig::new()
        .with_max_retries(settings.max_retries)
        .with_interrupt_timeout(Duration::from_millis(settings.interrupt_timeout_ms));
    config.system_message = settings.system_message.clone();
    config
}

pub fn build_request(prompt: String, settings: &EngineSettings, song: Option<&str>) -> Request {
    let request = Request::new(prompt)
        .with_temperature(settings.temperature)
        .with_max_tokens(settings.max_tokens)
        .with_tools(settings.tools_enabled)
        .with_streaming(settings.streaming);
    match song {
        Some(song) => request.with_song_id(song),
        None => request,
    }
}

pub fn load_analysis(path: &Path) -> Result<AnalysisData> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read analysis file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid analysis file: {}", path.display()))
}

pub fn collaborators(balls: usize, analysis: Option<&Path>) -> Result<Collaborators> {
    if balls == 0 {
        return Err(anyhow!("the show needs at least one ball"));
    }
    let mut collaborators =
        Collaborators::new().with_timeline(Arc::new(InMemoryTimeline::new(balls)));
    if let Some(path) = analysis {
        let data = load_analysis(path)?;
        collaborators = collaborators.with_analysis(Arc::new(StaticAnalysis::new(data)));
    }
    Ok(collaborators)
}

pub fn coordinator(config: &GlintConfig, collaborators: Collaborators) -> Result<RequestCoordinator> {
    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry, &collaborators);

    let pricing = PricingTable::default().merged(config.pricing.clone());
    let client = ClientBuilder::new()
        .with_config(provider_config(&config.provider))
        .build()
        .with_context(|| format!("Failed to set up the {} provider", config.provider.name))?;

    Ok(RequestCoordinator::new(registry, collaborators)
        .with_config(engine_config(&config.engine))
        .with_usage_tracker(Arc::new(UsageTracker::new(pricing)))
        .with_client(client))
}
