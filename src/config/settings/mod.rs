
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;
use crate::provider::ProviderSettings;

pub const DEFAULT_BASE_URL: &str = "https://api.siliconflow.cn/v1";
pub const DEFAULT_RERANK_MODEL: &str = "BAAI/bge-reranker-v2-m3";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    pub vector_store: VectorStoreConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_sec: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout_sec: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    pub model: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_tokens_per_input")]
    pub max_tokens_per_input: usize,
    /// Optional `tokenizer.json` used for token-exact truncation
    #[serde(default)]
    pub tokenizer_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RerankConfig {
    pub enabled: bool,
    pub model: String,
    /// Defaults to `min(5, retrieved)` when unset
    pub top_n: Option<usize>,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: DEFAULT_RERANK_MODEL.to_string(),
            top_n: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorStoreConfig {
    pub persist_dir: PathBuf,
    pub collection: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub include_globs: Option<Vec<String>>,
    pub exclude_globs: Option<Vec<String>>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 300,
            chunk_overlap: 60,
            include_globs: None,
            exclude_globs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    pub top_k: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { top_k: 12 }
    }
}

const fn default_batch_size() -> usize {
    8
}

const fn default_max_tokens_per_input() -> usize {
    350
}

const fn default_recursive() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing runtime.api_key in config (or OPENAI_API_KEY in the environment)")]
    MissingApiKey,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid model name for {0} (cannot be empty)")]
    InvalidModel(&'static str),
    #[error("Invalid timeout: {0} (must be between 1 and 3600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(usize),
    #[error("Invalid max_tokens_per_input: {0} (must be greater than 0)")]
    InvalidMaxTokens(usize),
    #[error("Invalid chunk size: {0} (must be greater than 0)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { overlap: usize, size: usize },
    #[error("Invalid top_k: {0} (must be greater than 0)")]
    InvalidTopK(usize),
    #[error("Invalid rerank top_n: {0} (must be greater than 0)")]
    InvalidTopN(usize),
    #[error("Invalid collection name: {0:?}")]
    InvalidCollection(String),
    #[error("Invalid glob pattern {pattern:?}: {message}")]
    InvalidGlob { pattern: String, message: String },
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Config {
    /// Load and validate a configuration file.
    ///
    /// Files ending in `.toml` are parsed as TOML, anything else as YAML.
    #[inline]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::parse(&content, is_toml(path))?;
        config.validate()?;

        info!("[CONFIG] base_url={}", config.runtime.base_url);
        if let Some(key) = &config.runtime.api_key {
            info!("[CONFIG] key head/tail={}", mask_key(key));
        }

        Ok(config)
    }

    #[inline]
    pub fn parse(content: &str, toml_format: bool) -> Result<Self, ConfigError> {
        if toml_format {
            Ok(toml::from_str(content)?)
        } else {
            Ok(serde_yaml::from_str(content)?)
        }
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.runtime.validate()?;

        if self.embedding.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel("embedding.model"));
        }
        if self.embedding.batch_size == 0 || self.embedding.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.embedding.batch_size));
        }
        if self.embedding.max_tokens_per_input == 0 {
            return Err(ConfigError::InvalidMaxTokens(
                self.embedding.max_tokens_per_input,
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel("llm.model"));
        }
        if self.rerank.enabled && self.rerank.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel("rerank.model"));
        }
        if self.rerank.top_n == Some(0) {
            return Err(ConfigError::InvalidTopN(0));
        }
        if self.vector_store.collection.trim().is_empty() {
            return Err(ConfigError::InvalidCollection(
                self.vector_store.collection.clone(),
            ));
        }
        if self.query.top_k == 0 {
            return Err(ConfigError::InvalidTopK(self.query.top_k));
        }

        self.ingest.validate()?;
        Ok(())
    }

    /// Provider connection settings shared by every remote adapter
    #[inline]
    pub fn provider_settings(&self) -> Result<ProviderSettings, ConfigError> {
        let api_key = self
            .runtime
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        Ok(ProviderSettings {
            base_url: self.runtime.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout: Duration::from_secs(self.runtime.timeout_sec),
        })
    }
}

impl RuntimeConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.base_url)
            .map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(self.base_url.clone()));
        }

        if self.timeout_sec == 0 || self.timeout_sec > 3600 {
            return Err(ConfigError::InvalidTimeout(self.timeout_sec));
        }

        Ok(())
    }

    /// Fill in the API key from an outside source when the file has none
    #[inline]
    pub fn fill_api_key(&mut self, fallback: Option<String>) {
        let missing = self
            .api_key
            .as_deref()
            .is_none_or(|key| key.trim().is_empty());
        if missing {
            self.api_key = fallback.filter(|key| !key.trim().is_empty());
        }
    }
}

impl IngestConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge {
                overlap: self.chunk_overlap,
                size: self.chunk_size,
            });
        }

        self.include_patterns()?;
        self.exclude_patterns()?;
        Ok(())
    }

    #[inline]
    pub fn include_patterns(&self) -> Result<Vec<Pattern>, ConfigError> {
        compile_patterns(self.include_globs.as_deref())
    }

    #[inline]
    pub fn exclude_patterns(&self) -> Result<Vec<Pattern>, ConfigError> {
        compile_patterns(self.exclude_globs.as_deref())
    }

    #[inline]
    pub fn chunking_config(&self) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }
}

fn compile_patterns(globs: Option<&[String]>) -> Result<Vec<Pattern>, ConfigError> {
    globs
        .unwrap_or_default()
        .iter()
        .map(|glob| {
            Pattern::new(glob).map_err(|e| ConfigError::InvalidGlob {
                pattern: glob.clone(),
                message: e.msg.to_string(),
            })
        })
        .collect()
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

/// Render an API key as `head...tail` for logging
#[inline]
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 10 {
        return "***".to_string();
    }

    let head: String = chars.iter().take(6).collect();
    let tail: String = chars.iter().skip(chars.len() - 4).collect();
    format!("{}...{}", head, tail)
}
