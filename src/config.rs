//! Configuration management with TOML, environment variables, and CLI overrides.

use crate::amazon::regions::Region;
use crate::data::DataPaths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Application configuration with layered loading.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Edge worker settings
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Text generation / vision API settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Page scraping and relay settings
    #[serde(default)]
    pub client: ClientConfig,

    /// Reference table overrides
    #[serde(default)]
    pub data: DataPaths,

    /// Output format for lookups
    #[serde(default)]
    pub format: OutputFormat,
}

/// Settings for the HTTP worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Duty rate applied when no tariff entry matches
    #[serde(default = "default_baseline_rate")]
    pub baseline_rate: f64,
}

/// Settings for the OpenAI-compatible completion API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API root, e.g. https://api.openai.com/v1
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Bearer token
    #[serde(default)]
    pub api_key: Option<String>,

    /// Text model used for classification and origin analysis
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used to caption product images
    #[serde(default = "default_model")]
    pub vision_model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token cap
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

/// Settings for page fetching and the relay to the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Worker base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Amazon region product pages are fetched from
    #[serde(default = "default_region")]
    pub region: Region,

    /// Proxy URL (e.g., socks5://host:port)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Base delay before each page request in milliseconds
    #[serde(default)]
    pub delay_ms: u64,

    /// Random jitter added to delay (0 to this value)
    #[serde(default)]
    pub delay_jitter_ms: u64,

    /// How many times to refetch a page whose title has not rendered yet
    #[serde(default = "default_mount_attempts")]
    pub mount_attempts: u32,

    /// Fixed wait between those attempts in milliseconds
    #[serde(default = "default_mount_delay_ms")]
    pub mount_delay_ms: u64,
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_baseline_rate() -> f64 {
    0.10
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_api_base() -> String {
    "http://127.0.0.1:8787".to_string()
}

fn default_region() -> Region {
    Region::Uk
}

fn default_mount_attempts() -> u32 {
    10
}

fn default_mount_delay_ms() -> u64 {
    500
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { bind: default_bind(), baseline_rate: default_baseline_rate() }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            model: default_model(),
            vision_model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            region: default_region(),
            proxy: None,
            delay_ms: 0,
            delay_jitter_ms: 0,
            mount_attempts: default_mount_attempts(),
            mount_delay_ms: default_mount_delay_ms(),
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads configuration with fallback to default locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        // 1. Explicit path takes precedence
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        // 2. Try current directory
        let local_config = Path::new("config.toml");
        if local_config.exists() {
            debug!("Found config.toml in current directory");
            return Self::from_file(local_config);
        }

        // 3. Try XDG config directory
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("duty-finder").join("config.toml");
            if xdg_config.exists() {
                debug!("Found config in XDG config directory");
                return Self::from_file(xdg_config);
            }
        }

        // 4. Return default config
        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Applies environment variable overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                self.llm.api_key = Some(key);
            }
        }

        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            self.llm.base_url = url;
        }

        if let Ok(model) = std::env::var("MODEL") {
            self.llm.model = model;
        }

        if let Ok(model) = std::env::var("VISION_MODEL") {
            self.llm.vision_model = model;
        }

        if let Ok(rate) = std::env::var("BASELINE_RATE") {
            if let Ok(r) = rate.parse() {
                self.worker.baseline_rate = r;
            }
        }

        if let Ok(bind) = std::env::var("DUTY_BIND") {
            self.worker.bind = bind;
        }

        if let Ok(base) = std::env::var("DUTY_API_BASE") {
            self.client.api_base = base;
        }

        if let Ok(region) = std::env::var("DUTY_REGION") {
            if let Ok(r) = region.parse() {
                self.client.region = r;
            }
        }

        if let Ok(proxy) = std::env::var("DUTY_PROXY") {
            self.client.proxy = Some(proxy);
        }

        self
    }
}

/// Output format for lookup results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Html,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "text" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "html" => Ok(OutputFormat::Html),
            _ => Err(format!("Unknown format: {}. Use: table, json, html", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Html => write!(f, "html"),
        }
    }
}
