// Configuration management module
// TOML settings plus the `config` subcommand helpers

pub mod settings;


use anyhow::{Context, Result};
use console::style;

pub use settings::{
    Config, ConfigError, DocumentConfig, EmbeddingConfig, IndexConfig, ProviderKind,
    RetrievalConfig,
};

/// Write a default config file unless one already exists.
///
/// Returns `true` when a new file was written.
#[inline]
pub fn init_config(config: &Config) -> Result<bool> {
    let path = config.config_file_path();
    if path.exists() {
        return Ok(false);
    }

    config
        .save()
        .with_context(|| format!("Failed to write default config to {}", path.display()))?;
    Ok(true)
}

/// Print the effective configuration to stderr
#[inline]
pub fn show_config(config: &Config) {
    eprintln!("{}", style("Current Configuration").bold().cyan());
    eprintln!();
    eprint!("{}", describe_config(config));
    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
}

/// Plain-text summary of the settings, one `key: value` per line
#[inline]
pub fn describe_config(config: &Config) -> String {
    let embeddings = &config.embeddings;
    let endpoint = embeddings
        .base_url()
        .map_or_else(|e| format!("invalid ({})", e), |url| url.to_string());

    let lines = [
        "Embeddings:".to_string(),
        format!("  Provider: {:?}", embeddings.provider),
        format!("  Endpoint: {}", endpoint),
        format!("  Model: {}", embeddings.model),
        format!("  Dimension: {}", embeddings.embedding_dimension),
        format!("  API key variable: {}", embeddings.api_key_env),
        "Index:".to_string(),
        format!("  Name: {}", config.index.name),
        format!("  Location: {}", config.vector_database_path().display()),
        format!("  Batch size: {}", config.index.batch_size),
        format!("  Batch delay: {}ms", config.index.batch_delay_ms),
        format!("  Metadata text limit: {}", config.index.metadata_text_limit),
        "Retrieval:".to_string(),
        format!("  Top K: {}", config.retrieval.top_k),
        format!("  Candidate pool: {}", config.retrieval.candidate_pool),
        "Documents:".to_string(),
        format!("  Chunk size: {}", config.documents.chunk_size),
        format!("  Chunk overlap: {}", config.documents.chunk_overlap),
    ];

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
