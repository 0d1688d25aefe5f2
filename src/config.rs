use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chunk::DEFAULT_CHUNK_SIZE;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/recall.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: 0,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub default_k: usize,
    #[serde(default = "default_large_result_warning")]
    pub large_result_warning: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            large_result_warning: default_large_result_warning(),
        }
    }
}

fn default_k() -> usize {
    3
}
fn default_large_result_warning() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Maximum cached query keys; `0` disables the cache.
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_entries(),
        }
    }
}

fn default_cache_entries() -> usize {
    1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct BatchConfig {
    /// Concurrent queries per batch; `0` uses the host's parallelism.
    #[serde(default)]
    pub max_concurrency: usize,
    /// Per-query timeout; `0` disables it.
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 0,
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

fn default_query_timeout_secs() -> u64 {
    30
}

impl BatchConfig {
    pub fn effective_concurrency(&self) -> usize {
        if self.max_concurrency > 0 {
            return self.max_concurrency;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        (self.query_timeout_secs > 0).then(|| Duration::from_secs(self.query_timeout_secs))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
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
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "hash".to_string()
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
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            url: default_ollama_url(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout_secs(),
            language: default_language(),
        }
    }
}

fn default_llm_provider() -> String {
    "ollama".to_string()
}
pub(crate) fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_llm_model() -> String {
    "llama3:8b".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    120
}
fn default_language() -> String {
    "auto".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_exchange_log")]
    pub exchange_log: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            exchange_log: default_exchange_log(),
        }
    }
}

fn default_exchange_log() -> PathBuf {
    PathBuf::from("./data/llm_query_log.jsonl")
}

impl Config {
    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            bail!("chunking.overlap must be < chunking.chunk_size");
        }

        if self.retrieval.default_k == 0 {
            bail!("retrieval.default_k must be >= 1");
        }

        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }

        match self.embedding.provider.as_str() {
            "ollama" | "openai" => {
                if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                    bail!(
                        "embedding.dims must be > 0 when provider is '{}'",
                        self.embedding.provider
                    );
                }
                if self.embedding.model.is_none() {
                    bail!(
                        "embedding.model must be specified when provider is '{}'",
                        self.embedding.provider
                    );
                }
            }
            "hash" => {
                if self.embedding.dims == Some(0) {
                    bail!("embedding.dims must be > 0 when provider is 'hash'");
                }
            }
            "disabled" | "local" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be hash, ollama, openai, local, or disabled.",
                other
            ),
        }

        match self.llm.provider.as_str() {
            "ollama" | "disabled" => {}
            other => bail!(
                "Unknown llm provider: '{}'. Must be ollama or disabled.",
                other
            ),
        }

        if self.llm.language.parse::<crate::llm::Language>().is_err() {
            bail!(
                "llm.language must be auto, en, or es (got '{}')",
                self.llm.language
            );
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Load `path` when it exists, otherwise fall back to defaults.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.chunking.chunk_size, 1200);
        assert_eq!(config.retrieval.default_k, 3);
        assert_eq!(config.retrieval.large_result_warning, 100);
        assert_eq!(config.embedding.provider, "hash");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [db]
            path = "/tmp/x.sqlite"

            [cache]
            max_entries = 8
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.db.path, PathBuf::from("/tmp/x.sqlite"));
        assert_eq!(config.cache.max_entries, 8);
        assert_eq!(config.chunking.chunk_size, 1200);
        assert_eq!(config.llm.model, "llama3:8b");
    }

    #[test]
    fn rejects_bad_chunking() {
        let mut config = Config::default();
        config.chunking.chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.chunking.overlap = 1200;
        assert!(config.validate().is_err());
    }

    #[test]
    fn network_providers_need_model_and_dims() {
        let mut config = Config::default();
        config.embedding.provider = "ollama".to_string();
        assert!(config.validate().is_err());
        config.embedding.model = Some("nomic-embed-text".to_string());
        config.embedding.dims = Some(768);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_unknown_provider_and_language() {
        let mut config = Config::default();
        config.embedding.provider = "magic".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.llm.language = "fr".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn batch_concurrency_falls_back_to_host() {
        let batch = BatchConfig::default();
        assert!(batch.effective_concurrency() >= 1);
        assert_eq!(batch.query_timeout(), Some(Duration::from_secs(30)));

        let batch = BatchConfig {
            max_concurrency: 2,
            query_timeout_secs: 0,
        };
        assert_eq!(batch.effective_concurrency(), 2);
        assert_eq!(batch.query_timeout(), None);
    }
}
