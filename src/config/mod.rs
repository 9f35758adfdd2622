#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::chunker::ChunkingConfig;
use crate::retry::RetryPolicy;

pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub ollama: OllamaConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub chunking: ChunkingConfig,
    pub store: StoreConfig,
    pub retrieval: RetrievalConfig,
    pub retry: RetryConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            ollama: OllamaConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            chunking: ChunkingConfig::default(),
            store: StoreConfig::default(),
            retrieval: RetrievalConfig::default(),
            retry: RetryConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}

/// Connection settings shared by the embedding and generation clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
}

impl Default for OllamaConfig {
    #[inline]
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
        }
    }
}

impl OllamaConfig {
    #[inline]
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&format!("{}://{}:{}", self.protocol, self.host, self.port))
            .map_err(|_| ConfigError::InvalidUrl(format!("{}://{}:{}", self.protocol, self.host, self.port)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    Remote,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which implementation serves embeddings. Chosen once at startup;
    /// there is no runtime fallback between backends.
    pub backend: EmbeddingBackend,
    pub model: String,
    pub dimension: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Remote,
            model: "nomic-embed-text:latest".to_string(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            batch_size: 16,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    /// When false the synthesizer goes straight to the extractive path.
    pub enabled: bool,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Timeout for the lightweight health probe preceding each call.
    pub probe_timeout_secs: u64,
}

impl Default for GenerationConfig {
    #[inline]
    fn default() -> Self {
        Self {
            enabled: true,
            model: "qwen2.5:7b".to_string(),
            temperature: 0.2,
            max_tokens: 1500,
            timeout_secs: 30,
            probe_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Overrides the default `<base_dir>/docqa.db` location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    #[inline]
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            database_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub similarity_floor: f32,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_floor: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_jitter_ms: u64,
}

impl Default for RetryConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_jitter_ms: 250,
        }
    }
}

impl RetryConfig {
    #[inline]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_jitter_ms),
        )
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 16 and 4096)")]
    InvalidEmbeddingDimension(usize),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(usize),
    #[error("Invalid model name: cannot be empty")]
    InvalidModel,
    #[error("Invalid chunk size: {0} (must be between 100 and 8000)")]
    InvalidChunkSize(usize),
    #[error("Invalid overlap: {0} (must be smaller than the chunk size {1})")]
    InvalidOverlap(usize, usize),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("Invalid max tokens: {0} (must be between 1 and 8192)")]
    InvalidMaxTokens(u32),
    #[error("Invalid timeout: {0} (must be at least 1 second)")]
    InvalidTimeout(u64),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid similarity floor: {0} (must be between 0.0 and 1.0)")]
    InvalidSimilarityFloor(f32),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            let mut config = Self::default();
            config.base_dir = config_dir.as_ref().to_path_buf();
            return Ok(config);
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!("Failed to create config directory: {}", self.base_dir.display())
        })?;

        let config_path = self.base_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Default per-user data directory.
    #[inline]
    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docqa")
    }

    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.store
            .database_path
            .clone()
            .unwrap_or_else(|| self.base_dir.join("docqa.db"))
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ollama.port == 0 {
            return Err(ConfigError::InvalidPort(self.ollama.port));
        }
        if self.ollama.protocol != "http" && self.ollama.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.ollama.protocol.clone()));
        }
        self.ollama.base_url()?;

        if !(16..=4096).contains(&self.embedding.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(self.embedding.dimension));
        }
        if !(1..=1000).contains(&self.embedding.batch_size) {
            return Err(ConfigError::InvalidBatchSize(self.embedding.batch_size));
        }
        if self.embedding.backend == EmbeddingBackend::Remote && self.embedding.model.is_empty() {
            return Err(ConfigError::InvalidModel);
        }
        if self.embedding.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(self.embedding.timeout_secs));
        }

        if !(100..=8000).contains(&self.chunking.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.chunking.chunk_size));
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(ConfigError::InvalidOverlap(
                self.chunking.overlap,
                self.chunking.chunk_size,
            ));
        }

        if self.generation.enabled {
            if self.generation.model.is_empty() {
                return Err(ConfigError::InvalidModel);
            }
            if !(0.0..=2.0).contains(&self.generation.temperature) {
                return Err(ConfigError::InvalidTemperature(self.generation.temperature));
            }
            if !(1..=8192).contains(&self.generation.max_tokens) {
                return Err(ConfigError::InvalidMaxTokens(self.generation.max_tokens));
            }
            if self.generation.timeout_secs == 0 {
                return Err(ConfigError::InvalidTimeout(self.generation.timeout_secs));
            }
            if self.generation.probe_timeout_secs == 0 {
                return Err(ConfigError::InvalidTimeout(self.generation.probe_timeout_secs));
            }
        }

        if !(1..=100).contains(&self.retrieval.top_k) {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }
        if !(0.0..=1.0).contains(&self.retrieval.similarity_floor) {
            return Err(ConfigError::InvalidSimilarityFloor(
                self.retrieval.similarity_floor,
            ));
        }

        if !(1..=10).contains(&self.retry.max_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry.max_attempts));
        }

        Ok(())
    }
}
