
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::http::JsonClient;
use super::{EmbeddingProvider, check_dimension};
use crate::RagError;
use crate::config::EmbeddingConfig;

/// Embedding client for a local or remote Ollama server
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: JsonClient,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> crate::Result<Self> {
        let base_url = config
            .base_url()
            .map_err(|e| RagError::Configuration(e.to_string()))?;

        Ok(Self {
            http: JsonClient::new(
                base_url,
                Duration::from_secs(config.timeout_secs),
                config.retry_attempts,
            ),
            model: config.model.clone(),
            dimension: config.embedding_dimension as usize,
        })
    }

    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http.set_timeout(timeout);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.http.set_retry_attempts(attempts);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.http.set_initial_backoff(backoff);
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl EmbeddingProvider for OllamaClient {
    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating Ollama embedding for text (length: {})", text.len());

        let request = EmbedRequest {
            model: &self.model,
            input: text,
        };
        let response: EmbedResponse = self
            .http
            .post_json("/api/embed", &request, None)
            .context("Failed to generate embedding")?;

        let embedding = response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Ollama returned no embeddings"))?;
        check_dimension(&embedding, self.dimension)?;

        debug!("Generated embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }
}
