//! TOML configuration parsing and validation.
//!
//! Every section except `[db]` is optional and falls back to defaults that
//! match the public providers (SerpAPI for search, English Wikipedia for the
//! encyclopedic fallback) and the offline extractive summarizer.
//!
//! Credentials never live in the TOML file. The search key is read from the
//! environment variable named by `search.api_key_env`; the binary loads a
//! `.env` file with `dotenvy` before the config is parsed.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub encyclopedia: EncyclopediaConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Upper bound on evidence documents kept from the winning provider.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
        }
    }
}

fn default_max_results() -> usize {
    4
}

/// Primary search provider (SerpAPI-compatible JSON endpoint).
#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_search_endpoint(),
            api_key_env: default_api_key_env(),
            language: default_language(),
            timeout_secs: default_search_timeout(),
        }
    }
}

impl SearchConfig {
    /// Returns the configured API key, treating blank values as absent.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

fn default_true() -> bool {
    true
}
fn default_search_endpoint() -> String {
    "https://serpapi.com/search.json".to_string()
}
fn default_api_key_env() -> String {
    "SERPAPI_KEY".to_string()
}
fn default_language() -> String {
    "en".to_string()
}
fn default_search_timeout() -> u64 {
    25
}

/// Encyclopedic fallback (MediaWiki action API + REST summary API).
#[derive(Debug, Deserialize, Clone)]
pub struct EncyclopediaConfig {
    /// Site root, e.g. `https://en.wikipedia.org`.
    #[serde(default = "default_site_url")]
    pub site_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_encyclopedia_timeout")]
    pub timeout_secs: u64,
}

impl Default for EncyclopediaConfig {
    fn default() -> Self {
        Self {
            site_url: default_site_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_encyclopedia_timeout(),
        }
    }
}

impl EncyclopediaConfig {
    /// User agent sent with every request. `ENCYCLOPEDIA_USER_AGENT` wins
    /// over the file value when set.
    pub fn effective_user_agent(&self) -> String {
        std::env::var("ENCYCLOPEDIA_USER_AGENT")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.user_agent.clone())
    }
}

fn default_site_url() -> String {
    "https://en.wikipedia.org".to_string()
}
fn default_user_agent() -> String {
    format!("ResearchDigest/{}", env!("CARGO_PKG_VERSION"))
}
fn default_encyclopedia_timeout() -> u64 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    #[serde(default = "default_summarizer_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Model context size in tokens. Values above 100000 are treated as
    /// unset (some tokenizers report a sentinel).
    #[serde(default)]
    pub model_max_tokens: Option<usize>,
    #[serde(default = "default_safety_margin")]
    pub safety_margin: usize,
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            provider: default_summarizer_provider(),
            model: None,
            url: None,
            model_max_tokens: None,
            safety_margin: default_safety_margin(),
            tokenizer: default_tokenizer(),
        }
    }
}

fn default_summarizer_provider() -> String {
    "extractive".to_string()
}
fn default_safety_margin() -> usize {
    128
}
fn default_tokenizer() -> String {
    "whitespace".to_string()
}

impl Config {
    /// Configuration with defaults everywhere and the database under `./data`.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/rdigest.sqlite"),
            },
            server: ServerConfig::default(),
            retrieval: RetrievalConfig::default(),
            search: SearchConfig::default(),
            encyclopedia: EncyclopediaConfig::default(),
            summarizer: SummarizerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.retrieval.max_results == 0 {
        anyhow::bail!("retrieval.max_results must be >= 1");
    }

    if config.search.timeout_secs == 0 || config.encyclopedia.timeout_secs == 0 {
        anyhow::bail!("provider timeout_secs must be > 0");
    }

    if config.summarizer.model_max_tokens == Some(0) {
        anyhow::bail!("summarizer.model_max_tokens must be > 0");
    }

    match config.summarizer.provider.as_str() {
        "extractive" => {}
        "ollama" => {
            if config.summarizer.model.is_none() {
                anyhow::bail!("summarizer.model must be specified when provider is 'ollama'");
            }
        }
        other => anyhow::bail!(
            "Unknown summarizer provider: '{}'. Must be extractive or ollama.",
            other
        ),
    }

    Ok(())
}
