//! Configuration file handling.
//!
//! This module handles loading, merging and validating configuration from
//! `.lendwatch.toml` files. One [`Config`] is built per process and handed
//! to the orchestrator at construction; nothing mutates it afterwards.

use crate::models::SourceKind;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".lendwatch.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Crawl service settings.
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Retry settings for fetch and analyze calls.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Monitoring run settings.
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// General application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory reports are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            verbose: false,
        }
    }
}

fn default_output_dir() -> String {
    "monitoring_results".to_string()
}

/// Crawl service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Base URL of the crawl service.
    #[serde(default = "default_fetch_url")]
    pub base_url: String,

    /// Bearer token for the crawl service, if it needs one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_seconds: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: default_fetch_url(),
            api_key: None,
            timeout_seconds: default_fetch_timeout(),
        }
    }
}

fn default_fetch_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_fetch_timeout() -> u64 {
    30
}

/// LLM model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// OpenAI-compatible API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key; usually supplied through `OPENAI_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_model_timeout")]
    pub timeout_seconds: u64,

    /// Characters of fetched content submitted per source analysis.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// Characters of the source digest submitted for the summary.
    #[serde(default = "default_summary_content_chars")]
    pub summary_content_chars: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            api_url: default_api_url(),
            api_key: None,
            temperature: default_temperature(),
            timeout_seconds: default_model_timeout(),
            max_content_chars: default_max_content_chars(),
            summary_content_chars: default_summary_content_chars(),
        }
    }
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_model_timeout() -> u64 {
    120
}

fn default_max_content_chars() -> usize {
    4000
}

fn default_summary_content_chars() -> usize {
    12000
}

/// Retry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Growth factor applied to the delay after each retry.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Ceiling for a single delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Random spread applied to each delay (0.0 - 1.0).
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_jitter() -> f64 {
    0.1
}

/// Monitoring run settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Source kinds monitored per company.
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceKind>,

    /// Wall-clock budget for one company's run.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_seconds: u64,

    /// Maximum analyze calls in flight at once.
    #[serde(default = "default_analyze_concurrency")]
    pub analyze_concurrency: usize,

    /// Companies monitored at once in batch mode.
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            run_timeout_seconds: default_run_timeout(),
            analyze_concurrency: default_analyze_concurrency(),
            batch_concurrency: default_batch_concurrency(),
        }
    }
}

fn default_sources() -> Vec<SourceKind> {
    SourceKind::ALL.to_vec()
}

fn default_run_timeout() -> u64 {
    300
}

fn default_analyze_concurrency() -> usize {
    4
}

fn default_batch_concurrency() -> usize {
    3
}

/// Keys copied from `.env.example` files and never replaced.
fn is_placeholder_key(key: &str) -> bool {
    let key = key.trim().to_lowercase();
    key.is_empty() || key.starts_with("your_") || key.ends_with("_here") || key == "changeme"
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were explicitly provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref dir) = args.output_dir {
            self.general.output_dir = dir.display().to_string();
        }
        if args.verbose {
            self.general.verbose = true;
        }

        if let Some(ref url) = args.fetch_url {
            self.fetcher.base_url = url.clone();
        }
        if let Some(ref key) = args.fetch_api_key {
            self.fetcher.api_key = Some(key.clone());
        }

        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.api_url {
            self.model.api_url = url.clone();
        }
        if let Some(ref key) = args.api_key {
            self.model.api_key = Some(key.clone());
        }

        if let Some(attempts) = args.max_attempts {
            self.retry.max_attempts = attempts;
        }
        if let Some(delay) = args.initial_delay_ms {
            self.retry.initial_delay_ms = delay;
        }

        if let Some(ref sources) = args.sources {
            let mut kinds: Vec<SourceKind> = sources.iter().map(|s| SourceKind::from(*s)).collect();
            kinds.sort();
            kinds.dedup();
            self.monitoring.sources = kinds;
        }
        if let Some(timeout) = args.timeout {
            self.monitoring.run_timeout_seconds = timeout;
        }
        if let Some(concurrency) = args.concurrency {
            self.monitoring.analyze_concurrency = concurrency;
        }
        if let Some(concurrency) = args.batch_concurrency {
            self.monitoring.batch_concurrency = concurrency;
        }
    }

    /// Check the merged configuration before any network call is made.
    pub fn validate(&self) -> Result<()> {
        if !is_http_url(&self.fetcher.base_url) {
            bail!("Fetch service URL must start with 'http://' or 'https://'");
        }
        if !is_http_url(&self.model.api_url) {
            bail!("Model API URL must start with 'http://' or 'https://'");
        }

        if let Some(ref key) = self.model.api_key {
            if is_placeholder_key(key) {
                bail!("Model API key looks like a placeholder; set OPENAI_API_KEY to a real key");
            }
        } else if self.model.api_url.contains("api.openai.com") {
            bail!("No model API key configured; set OPENAI_API_KEY or use --api-key");
        }
        if let Some(ref key) = self.fetcher.api_key {
            if is_placeholder_key(key) {
                bail!("Fetch service API key looks like a placeholder; set FIRECRAWL_API_KEY");
            }
        }

        if !(0.0..=2.0).contains(&self.model.temperature) {
            bail!("Temperature must be between 0.0 and 2.0");
        }
        if self.model.timeout_seconds == 0 || self.fetcher.timeout_seconds == 0 {
            bail!("Request timeouts must be at least 1 second");
        }
        if self.model.max_content_chars == 0 || self.model.summary_content_chars == 0 {
            bail!("Content budgets must be at least 1 character");
        }

        if self.retry.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        if self.retry.multiplier < 1.0 {
            bail!("Retry multiplier must be at least 1.0");
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            bail!("Retry jitter must be between 0.0 and 1.0");
        }

        if self.monitoring.sources.is_empty() {
            bail!("At least one source kind must be monitored");
        }
        if self.monitoring.run_timeout_seconds == 0 {
            bail!("Run timeout must be at least 1 second");
        }
        if self.monitoring.analyze_concurrency == 0 || self.monitoring.batch_concurrency == 0 {
            bail!("Concurrency must be at least 1");
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
