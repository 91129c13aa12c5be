// Configuration management module
// Loads the YAML/TOML config file and validates it before any adapter is built

pub mod settings;


pub use settings::{
    Config, ConfigError, EmbeddingConfig, IngestConfig, LlmConfig, PathsConfig, QueryConfig,
    RerankConfig, RuntimeConfig, VectorStoreConfig, mask_key,
};
