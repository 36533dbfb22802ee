//! TOML configuration.
//!
//! Every section is optional; a missing file at the default location yields
//! [`Config::default`]. See `config/harmony.example.toml` for all keys.

use anyhow::{Context, Result};
use harmony_core::embedding::ModelKey;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "./config/harmony.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_framework")]
    pub framework: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for Ollama.
    #[serde(default)]
    pub url: Option<String>,
    /// Azure OpenAI deployment id; defaults to the model name.
    #[serde(default)]
    pub deployment: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            framework: default_framework(),
            model: default_model(),
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
            url: None,
            deployment: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn model_key(&self) -> ModelKey {
        ModelKey::new(&self.framework, &self.model)
    }
}

fn default_framework() -> String {
    "huggingface".to_string()
}
fn default_model() -> String {
    "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct MatchingConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default)]
    pub allow_within_instrument: bool,
    #[serde(default = "default_negate")]
    pub negate: bool,
    #[serde(default)]
    pub one_to_one: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            allow_within_instrument: false,
            negate: true,
            one_to_one: false,
        }
    }
}

fn default_threshold() -> f32 {
    0.5
}
fn default_negate() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CacheConfig {
    /// JSON snapshot file loaded before and saved after each run.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub max_entries: Option<usize>,
}

/// Read, parse and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path`, or fall back to defaults when `path` is the default location
/// and no file exists there.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path == Path::new(DEFAULT_CONFIG_PATH) && !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    load_config(path)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate embedding
    if config.embedding.framework.trim().is_empty() {
        anyhow::bail!("embedding.framework must not be empty");
    }
    if config.embedding.model.trim().is_empty() {
        anyhow::bail!("embedding.model must not be empty");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    // Validate matching
    if !(-1.0..=1.0).contains(&config.matching.threshold) {
        anyhow::bail!("matching.threshold must be in [-1.0, 1.0]");
    }

    // Validate cache
    if config.cache.max_entries == Some(0) {
        anyhow::bail!("cache.max_entries must be > 0 when set");
    }

    Ok(())
}
