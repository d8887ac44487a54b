//! TOML configuration parsing and validation.
//!
//! Every section is optional; omitted values fall back to the defaults
//! below. Secrets are never read from the file: API keys come from
//! `PINECONE_API_KEY`, `GROQ_API_KEY` and `OPENAI_API_KEY`.
//!
//! ```toml
//! [index]
//! name = "acadmate-gemini"
//!
//! [embedding]
//! mode = "auto"            # auto | default | forced
//!
//! [retrieval]
//! top_k = 5
//!
//! [generation]
//! model = "llama-3.1-8b-instant"
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use marks_rag_core::catalog;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_name")]
    pub name: String,
    /// Data-plane host. Resolved through the control plane when unset.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_control_url")]
    pub control_url: String,
    /// Skip dimension discovery and use this value.
    #[serde(default)]
    pub dimension: Option<usize>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: default_index_name(),
            host: None,
            control_url: default_control_url(),
            dimension: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_index_name() -> String {
    "acadmate-gemini".to_string()
}
fn default_control_url() -> String {
    "https://api.pinecone.io".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

/// How the active embedding model is chosen at startup.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingMode {
    /// Benchmark compatible models against the live index.
    #[default]
    Auto,
    /// Use the default model for the index dimension.
    Default,
    /// Use `embedding.model`, falling back to auto on load failure.
    Forced,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub mode: EmbeddingMode,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    #[serde(default = "default_openai_url")]
    pub openai_url: String,
    #[serde(default = "default_embed_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: EmbeddingMode::Auto,
            model: None,
            ollama_url: default_ollama_url(),
            openai_url: default_openai_url(),
            max_retries: default_embed_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_openai_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_embed_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct SelectionConfig {
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_candidate_timeout_secs")]
    pub candidate_timeout_secs: u64,
    #[serde(default = "default_selection_min_score")]
    pub min_score: f32,
    #[serde(default = "default_probe_retries")]
    pub probe_retries: u32,
    #[serde(default = "default_probe_queries")]
    pub probe_queries: Vec<String>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_candidates: default_max_candidates(),
            concurrency: default_concurrency(),
            candidate_timeout_secs: default_candidate_timeout_secs(),
            min_score: default_selection_min_score(),
            probe_retries: default_probe_retries(),
            probe_queries: default_probe_queries(),
        }
    }
}

impl SelectionConfig {
    pub fn candidate_timeout(&self) -> Duration {
        Duration::from_secs(self.candidate_timeout_secs)
    }
}

fn default_max_candidates() -> usize {
    6
}
fn default_concurrency() -> usize {
    3
}
fn default_candidate_timeout_secs() -> u64 {
    60
}
fn default_selection_min_score() -> f32 {
    0.05
}
fn default_probe_retries() -> u32 {
    2
}
fn default_probe_queries() -> Vec<String> {
    [
        "software engineering principles",
        "software quality assurance",
        "testing methodology and practices",
        "system design patterns",
        "database management systems",
        "algorithms and data structures",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub min_score: f32,
    #[serde(default = "default_retrieval_retries")]
    pub max_retries: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: 0.0,
            max_retries: default_retrieval_retries(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_retrieval_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_generation_url")]
    pub base_url: String,
    #[serde(default = "default_max_tokens_cap")]
    pub max_tokens_cap: u32,
    #[serde(default = "default_generation_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            base_url: default_generation_url(),
            max_tokens_cap: default_max_tokens_cap(),
            max_retries: default_generation_retries(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_model() -> String {
    "llama-3.1-8b-instant".to_string()
}
fn default_generation_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_max_tokens_cap() -> u32 {
    2000
}
fn default_generation_retries() -> u32 {
    2
}
fn default_generation_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

/// Read, parse and validate a config file.
///
/// A missing file is not an error: the defaults describe a working setup
/// as long as the API keys are in the environment.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };
    validate(&config)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

pub fn validate(config: &Config) -> Result<()> {
    if config.index.name.trim().is_empty() {
        anyhow::bail!("index.name must not be empty");
    }
    if config.index.dimension == Some(0) {
        anyhow::bail!("index.dimension must be > 0");
    }

    if config.embedding.mode == EmbeddingMode::Forced {
        match config.embedding.model.as_deref() {
            None => anyhow::bail!("embedding.model must be specified when mode is 'forced'"),
            Some(id) if catalog::find(id).is_none() => anyhow::bail!(
                "Unknown embedding model: '{}'. Run `mrag models` for the list of known models.",
                id
            ),
            Some(_) => {}
        }
    }

    if config.selection.max_candidates == 0 {
        anyhow::bail!("selection.max_candidates must be >= 1");
    }
    if config.selection.concurrency == 0 {
        anyhow::bail!("selection.concurrency must be >= 1");
    }
    if config.selection.probe_queries.is_empty() {
        anyhow::bail!("selection.probe_queries must not be empty");
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.min_score < 0.0 {
        anyhow::bail!("retrieval.min_score must be >= 0.0");
    }

    if config.generation.max_tokens_cap == 0 {
        anyhow::bail!("generation.max_tokens_cap must be > 0");
    }

    Ok(())
}
