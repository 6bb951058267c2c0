//! Configuration surface named in spec.md §6: loaded from an optional
//! `soulbrowser.toml`, overridable by `SOULBROWSER_*` environment variables,
//! falling back to the documented defaults when neither is present.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryToml {
    pub max_retries: u32,
    pub base_delay_secs: f64,
    pub max_delay_secs: f64,
    pub exponential: bool,
    pub jitter: bool,
    pub timeout_seconds: f64,
}

impl Default for RetryToml {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 1.0,
            max_delay_secs: 60.0,
            exponential: true,
            jitter: true,
            timeout_seconds: 120.0,
        }
    }
}

impl RetryToml {
    pub fn to_retry_config(&self) -> retry_engine::RetryConfig {
        retry_engine::RetryConfig {
            max_retries: self.max_retries,
            base_delay: Duration::from_secs_f64(self.base_delay_secs),
            max_delay: Duration::from_secs_f64(self.max_delay_secs),
            exponential_backoff: self.exponential,
            jitter: self.jitter,
            timeout: Duration::from_secs_f64(self.timeout_seconds),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub preferred_approach: Option<String>,
    pub enable_dom_analysis: bool,
    pub enable_ai_assist: bool,
    pub enable_vision: bool,
    pub max_retries_per_approach: u32,
    pub total_timeout_seconds: f64,
    pub show_browser: bool,
    pub dom_confidence_threshold: f64,
    pub ai_confidence_threshold: f64,
    pub vision_confidence_threshold: f64,
    pub interactive_recovery_enabled: bool,
    pub metrics_port: u16,
    pub retry: RetryToml,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            preferred_approach: None,
            enable_dom_analysis: true,
            enable_ai_assist: true,
            enable_vision: true,
            max_retries_per_approach: 3,
            total_timeout_seconds: 300.0,
            show_browser: false,
            dom_confidence_threshold: 0.7,
            ai_confidence_threshold: 0.7,
            vision_confidence_threshold: 0.5,
            interactive_recovery_enabled: true,
            metrics_port: 9469,
            retry: RetryToml::default(),
        }
    }
}

impl AppConfig {
    pub fn to_orchestrator_config(&self) -> orchestrator::OrchestratorConfig {
        let mut retry = self.retry.to_retry_config();
        // `max_retries_per_approach` is the top-level knob spec.md §6 lists
        // alongside the nested `retry` table; the nested table's own
        // `max_retries` only exists to let `[retry]` be configured as one
        // self-contained block, so the top-level field wins when present.
        retry.max_retries = self.max_retries_per_approach;

        orchestrator::OrchestratorConfig {
            enable_dom_analysis: self.enable_dom_analysis,
            enable_ai_assist: self.enable_ai_assist,
            enable_vision: self.enable_vision,
            interactive_recovery_enabled: self.interactive_recovery_enabled,
            retry,
            ai_confidence_threshold: self.ai_confidence_threshold,
            vision_confidence_threshold: self.vision_confidence_threshold,
            total_timeout: Duration::from_secs_f64(self.total_timeout_seconds),
        }
    }

    /// Parses `preferred_approach` (e.g. `"dom"`, `"ai_assist"`, `"vision"`)
    /// into the typed `Approach` the Routing Decider's rule 1 consults.
    /// Unset or unrecognized values mean no forced preference.
    pub fn preferred_approach(&self) -> Option<soulbrowser_core_types::Approach> {
        use soulbrowser_core_types::Approach;
        match self.preferred_approach.as_deref()?.to_lowercase().as_str() {
            "dom" => Some(Approach::Dom),
            "ai_assist" | "ai-assist" | "aiassist" => Some(Approach::AiAssist),
            "vision" => Some(Approach::Vision),
            _ => None,
        }
    }
}

/// Loads configuration from (in ascending priority) built-in defaults,
/// `./soulbrowser.toml`, `~/.soulbrowser/config.toml`, then `SOULBROWSER_*`
/// environment variables.
pub fn load(explicit_path: Option<&PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(config::Config::try_from(&AppConfig::default())?);

    if let Some(path) = explicit_path {
        builder = builder.add_source(config::File::from(path.as_path()).required(true));
    } else {
        builder = builder.add_source(config::File::with_name("soulbrowser").required(false));
        if let Some(home) = dirs::home_dir() {
            let global = home.join(".soulbrowser").join("config.toml");
            builder = builder.add_source(config::File::from(global).required(false));
        }
    }

    builder
        .add_source(config::Environment::with_prefix("SOULBROWSER").separator("__"))
        .build()?
        .try_deserialize()
}
