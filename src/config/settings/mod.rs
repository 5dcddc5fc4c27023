
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1536;
pub const DEFAULT_INDEX_NAME: &str = "1pitchdeck";
const APP_DIR_NAME: &str = "pitchdeck-rag";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub documents: DocumentConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: ProviderKind,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub embedding_dimension: u32,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            protocol: "https".to_string(),
            host: "api.openai.com".to_string(),
            port: 443,
            model: "text-embedding-3-small".to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
            retry_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    pub name: String,
    pub batch_size: usize,
    /// Pause between upsert batches, in milliseconds
    pub batch_delay_ms: u64,
    pub ready_timeout_secs: u64,
    /// Maximum number of characters of document text kept in index metadata
    pub metadata_text_limit: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_INDEX_NAME.to_string(),
            batch_size: 100,
            batch_delay_ms: 2000,
            ready_timeout_secs: 10,
            metadata_text_limit: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Number of vector hits pulled before lexical re-ranking
    pub candidate_pool: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            candidate_pool: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DocumentConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid request timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(String),
    #[error("Invalid index name: '{0}' (lowercase letters, digits and '-' only)")]
    InvalidIndexName(String),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(usize),
    #[error("Invalid metadata text limit: {0} (must be between 1 and 40000)")]
    InvalidMetadataTextLimit(usize),
    #[error("Invalid ready timeout: {0} (must be at most 300 seconds)")]
    InvalidReadyTimeout(u64),
    #[error("Invalid top_k: {0} (must be between 1 and 50)")]
    InvalidTopK(usize),
    #[error("Candidate pool ({0}) must be between top_k ({1}) and 1000")]
    InvalidCandidatePool(usize, usize),
    #[error("Invalid chunk size: {0} (must be between 100 and 8000)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    InvalidChunkOverlap(usize, usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default configuration directory, `<platform config dir>/pitchdeck-rag`
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load configuration from the default configuration directory
    #[inline]
    pub fn load_default() -> Result<Self> {
        let dir = Self::config_dir().context("Failed to locate configuration directory")?;
        Self::load(dir)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
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

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embeddings.validate()?;
        self.index.validate()?;
        self.retrieval.validate()?;
        self.documents.validate()?;
        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Directory holding the LanceDB vector index
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.get_base_dir().join("vectors")
    }
}

impl EmbeddingConfig {
    /// Settings for a local Ollama server running `nomic-embed-text`
    #[inline]
    pub fn ollama() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            embedding_dimension: 768,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        self.base_url()?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        if !(1..=600).contains(&self.timeout_secs) {
            return Err(ConfigError::InvalidTimeout(self.timeout_secs));
        }

        if !(1..=10).contains(&self.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        Ok(())
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String, ConfigError> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingCredential(self.api_key_env.clone())),
        }
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_embedding_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        if !(64..=4096).contains(&dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.embedding_dimension = dimension;
        Ok(())
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_name = !self.name.is_empty()
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid_name {
            return Err(ConfigError::InvalidIndexName(self.name.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(1..=40_000).contains(&self.metadata_text_limit) {
            return Err(ConfigError::InvalidMetadataTextLimit(
                self.metadata_text_limit,
            ));
        }

        if self.ready_timeout_secs > 300 {
            return Err(ConfigError::InvalidReadyTimeout(self.ready_timeout_secs));
        }

        Ok(())
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=50).contains(&self.top_k) {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }

        if self.candidate_pool < self.top_k || self.candidate_pool > 1000 {
            return Err(ConfigError::InvalidCandidatePool(
                self.candidate_pool,
                self.top_k,
            ));
        }

        Ok(())
    }
}

impl DocumentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(100..=8000).contains(&self.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::InvalidChunkOverlap(
                self.chunk_overlap,
                self.chunk_size,
            ));
        }

        Ok(())
    }
}
