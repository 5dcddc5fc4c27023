
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::http::JsonClient;
use super::{EmbeddingProvider, check_dimension};
use crate::RagError;
use crate::config::EmbeddingConfig;

/// Client for OpenAI-compatible `/v1/embeddings` endpoints
#[derive(Clone)]
pub struct OpenAiClient {
    http: JsonClient,
    api_key: String,
    model: String,
    dimension: usize,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.http.base_url().as_str())
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiClient {
    /// Create a client using the API key from the configured environment variable
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> crate::Result<Self> {
        let api_key = config
            .api_key()
            .map_err(|e| RagError::Configuration(e.to_string()))?;
        Self::with_api_key(config, api_key)
    }

    #[inline]
    pub fn with_api_key(config: &EmbeddingConfig, api_key: String) -> crate::Result<Self> {
        let base_url = config
            .base_url()
            .map_err(|e| RagError::Configuration(e.to_string()))?;

        Ok(Self {
            http: JsonClient::new(
                base_url,
                Duration::from_secs(config.timeout_secs),
                config.retry_attempts,
            ),
            api_key,
            model: config.model.clone(),
            dimension: config.embedding_dimension as usize,
        })
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

impl EmbeddingProvider for OpenAiClient {
    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating OpenAI embedding for text (length: {})", text.len());

        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
            dimensions: self.dimension,
        };
        let response: EmbeddingResponse = self
            .http
            .post_json("/v1/embeddings", &request, Some(&self.api_key))
            .context("Failed to generate embedding")?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| anyhow::anyhow!("Embedding response contained no data"))?;
        check_dimension(&embedding, self.dimension)?;

        Ok(embedding)
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }
}
