// Embeddings module
// Text-to-vector providers consumed by the vector store

mod http;
pub mod ollama;
pub mod openai;

use anyhow::Result;
use std::sync::Arc;

use crate::RagError;
use crate::config::{EmbeddingConfig, ProviderKind};

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

/// Maps text to a fixed-length embedding vector
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text. Implementations apply their own timeout and retries.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector returned by [`EmbeddingProvider::embed`]
    fn dimension(&self) -> usize;
}

/// Build the provider selected in the configuration.
///
/// Fails with [`RagError::Configuration`] when a required credential is missing.
#[inline]
pub fn create_provider(config: &EmbeddingConfig) -> crate::Result<Arc<dyn EmbeddingProvider>> {
    config
        .validate()
        .map_err(|e| RagError::Configuration(e.to_string()))?;

    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        ProviderKind::OpenAi => Arc::new(OpenAiClient::new(config)?),
        ProviderKind::Ollama => Arc::new(OllamaClient::new(config)?),
    };
    Ok(provider)
}

/// Reject vectors whose length differs from the configured dimension
pub(crate) fn check_dimension(embedding: &[f32], expected: usize) -> Result<()> {
    if embedding.len() != expected {
        return Err(anyhow::anyhow!(
            "Embedding dimension mismatch: expected {}, got {}",
            expected,
            embedding.len()
        ));
    }
    Ok(())
}
