use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunk::{DEFAULT_MAX_BYTES, DEFAULT_OVERLAP_BYTES};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Vector-store collection name; one collection per workflow.
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            collection: default_collection(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/qag.sqlite")
}
fn default_collection() -> String {
    "qa_agent_docs".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
    #[serde(default = "default_overlap_bytes")]
    pub overlap_bytes: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            overlap_bytes: default_overlap_bytes(),
        }
    }
}

fn default_max_bytes() -> usize {
    DEFAULT_MAX_BYTES
}
fn default_overlap_bytes() -> usize {
    DEFAULT_OVERLAP_BYTES
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"openai"` or `"disabled"`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
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
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    /// Context chunks retrieved for test-case generation.
    #[serde(default = "default_context_chunks")]
    pub context_chunks: usize,
    /// Raw-markup prefix budget for script prompts, in bytes.
    #[serde(default = "default_markup_budget")]
    pub markup_budget_bytes: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            timeout_secs: default_generation_timeout(),
            context_chunks: default_context_chunks(),
            markup_budget_bytes: default_markup_budget(),
        }
    }
}

fn default_generation_model() -> String {
    "gpt-5".to_string()
}
fn default_generation_timeout() -> u64 {
    120
}
fn default_context_chunks() -> usize {
    8
}
fn default_markup_budget() -> usize {
    8000
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Load and validate configuration from a TOML file.
///
/// A missing file yields the built-in defaults so `qag` works out of the
/// box; a present-but-invalid file is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_bytes == 0 {
        anyhow::bail!("chunking.max_bytes must be > 0");
    }
    if config.chunking.overlap_bytes >= config.chunking.max_bytes {
        anyhow::bail!("chunking.overlap_bytes must be < chunking.max_bytes");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }
    if config.embedding.is_enabled() {
        if config.embedding.dims == 0 {
            anyhow::bail!("embedding.dims must be > 0");
        }
        if config.embedding.model.is_empty() {
            anyhow::bail!("embedding.model must not be empty");
        }
    }

    if config.store.collection.is_empty() {
        anyhow::bail!("store.collection must not be empty");
    }
    if config.generation.model.is_empty() {
        anyhow::bail!("generation.model must not be empty");
    }
    if config.generation.markup_budget_bytes == 0 {
        anyhow::bail!("generation.markup_budget_bytes must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_config(Path::new("/nonexistent/qag.toml")).unwrap();
        assert_eq!(config.chunking.max_bytes, 1000);
        assert_eq!(config.chunking.overlap_bytes, 200);
        assert_eq!(config.store.collection, "qa_agent_docs");
        assert_eq!(config.generation.context_chunks, 8);
        assert_eq!(config.generation.markup_budget_bytes, 8000);
    }

    #[test]
    fn test_invalid_overlap_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qag.toml");
        std::fs::write(&path, "[chunking]\nmax_bytes = 100\noverlap_bytes = 100\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qag.toml");
        std::fs::write(&path, "[embedding]\nprovider = \"disabled\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert!(!config.embedding.is_enabled());
        assert_eq!(config.chunking.max_bytes, 1000);
    }
}
