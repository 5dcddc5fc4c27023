#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::{
    DistanceMetric, IndexStats, LanceIndex, MetadataFilter, VectorEntry, VectorIndex,
};
use crate::config::Config;
use crate::embeddings::EmbeddingProvider;
use crate::models::{COMPANY_NAME_KEY, DOCUMENT_ID_KEY, Document, MetadataValue, SearchHit};
use crate::{RagError, Result};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Pitch-deck vector store: embeds documents and queries a [`VectorIndex`]
pub struct VectorStore {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    index_name: String,
    batch_delay: Duration,
    text_limit: usize,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("index_name", &self.index_name)
            .field("batch_delay", &self.batch_delay)
            .field("text_limit", &self.text_limit)
            .finish_non_exhaustive()
    }
}

impl VectorStore {
    /// Connect to the configured index, creating it when missing.
    ///
    /// # Arguments
    /// * `config` - Application configuration with the index settings
    /// * `embedder` - Provider used for both documents and queries
    /// * `index` - Backing vector index service
    ///
    /// # Returns
    /// * `Result<Self>` - Ready store, or an error when the index cannot be
    ///   created or does not become ready within the configured timeout
    #[inline]
    pub async fn connect(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        let store = Self {
            embedder,
            index,
            index_name: config.index.name.clone(),
            batch_delay: Duration::from_millis(config.index.batch_delay_ms),
            text_limit: config.index.metadata_text_limit,
        };

        store.ensure_index().await?;
        store
            .wait_until_ready(Duration::from_secs(config.index.ready_timeout_secs))
            .await?;

        info!("Vector store connected to index '{}'", store.index_name);
        Ok(store)
    }

    /// Connect using the embedded LanceDB database under the config directory
    #[inline]
    pub async fn open(config: &Config, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let index = LanceIndex::open(&config.vector_database_path()).await?;
        Self::connect(config, embedder, Arc::new(index)).await
    }

    /// Override the pause between upsert batches
    #[inline]
    #[must_use]
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    #[inline]
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    async fn ensure_index(&self) -> Result<()> {
        let dimension = self.embedder.dimension();

        match self.index.describe_index(&self.index_name).await? {
            Some(description) => {
                if description.dimension != dimension {
                    warn!(
                        "Index '{}' has dimension {} but the embedding provider produces {}",
                        self.index_name, description.dimension, dimension
                    );
                }
                debug!("Using existing index '{}'", self.index_name);
            }
            None => {
                info!("Index '{}' not found, creating it", self.index_name);
                self.index
                    .create_index(&self.index_name, dimension, DistanceMetric::Cosine)
                    .await?;
            }
        }

        Ok(())
    }

    async fn wait_until_ready(&self, timeout: Duration) -> Result<()> {
        let started = Instant::now();

        loop {
            let ready = self
                .index
                .describe_index(&self.index_name)
                .await?
                .is_some_and(|description| description.ready);
            if ready {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(RagError::Index(format!(
                    "Index '{}' was not ready after {:?}",
                    self.index_name, timeout
                )));
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// Embed and upsert documents in batches of at most `batch_size`.
    ///
    /// A batch that fails to embed or upsert is logged and skipped, so the
    /// return value only reports whether the call ran to completion. An empty
    /// input returns `false`.
    #[inline]
    pub async fn add_documents(&self, documents: &[Document], batch_size: usize) -> bool {
        if documents.is_empty() {
            warn!("No documents to add");
            return false;
        }

        let batch_size = batch_size.max(1);
        let batch_count = documents.len().div_ceil(batch_size);
        info!(
            "Adding {} documents to '{}' in {} batches",
            documents.len(),
            self.index_name,
            batch_count
        );

        for (batch_number, batch) in documents.chunks(batch_size).enumerate() {
            let batch_start = batch_number * batch_size;

            match self.upsert_batch(batch, batch_start).await {
                Ok(written) => debug!(
                    "Upserted batch {}/{} ({} vectors)",
                    batch_number + 1,
                    batch_count,
                    written
                ),
                Err(e) => error!(
                    "Failed to upsert batch {}/{}: {}",
                    batch_number + 1,
                    batch_count,
                    e
                ),
            }

            if batch_number + 1 < batch_count && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        true
    }

    async fn upsert_batch(&self, batch: &[Document], batch_start: usize) -> Result<usize> {
        let mut entries = Vec::with_capacity(batch.len());

        for (offset, document) in batch.iter().enumerate() {
            let embedding = self
                .embedder
                .embed(&document.text)
                .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;
            let id = document
                .metadata_text(DOCUMENT_ID_KEY)
                .map_or_else(|| format!("doc_{}_{}", batch_start, offset), str::to_string);

            let mut metadata = document.metadata.clone();
            if let Some(MetadataValue::Text(company)) = metadata.get_mut(COMPANY_NAME_KEY) {
                *company = company.to_lowercase();
            }

            entries.push(VectorEntry {
                id,
                embedding,
                metadata,
                raw_text_preview: document.text.chars().take(self.text_limit).collect(),
            });
        }

        self.index
            .upsert(&self.index_name, dedupe_by_id(entries))
            .await
    }

    /// Nearest-neighbour search for `query`, at most `k` hits by descending score.
    ///
    /// Failures are logged and yield an empty result.
    #[inline]
    pub async fn search_similar(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Vec<SearchHit> {
        match self.try_search(query, k, filter).await {
            Ok(hits) => hits,
            Err(e) => {
                error!("Vector search failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn try_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self
            .embedder
            .embed(query)
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;
        let matches = self
            .index
            .query(&self.index_name, &embedding, k, filter)
            .await?;

        let mut hits: Vec<SearchHit> = matches
            .into_iter()
            .map(|m| SearchHit {
                id: m.id,
                content: m.text,
                metadata: m.metadata,
                score: m.score,
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);

        debug!("Search for '{}' returned {} hits", query, hits.len());
        Ok(hits)
    }

    /// Search restricted to one company's documents
    #[inline]
    pub async fn search_by_company(&self, company_name: &str, k: usize) -> Vec<SearchHit> {
        let filter = MetadataFilter::from([(
            COMPANY_NAME_KEY.to_string(),
            MetadataValue::from(company_name.to_lowercase()),
        )]);
        self.search_similar(company_name, k, Some(&filter)).await
    }

    #[inline]
    pub async fn company_exists(&self, company_name: &str) -> bool {
        !self.search_by_company(company_name, 1).await.is_empty()
    }

    /// Index statistics, or empty statistics when they cannot be read
    #[inline]
    pub async fn stats(&self) -> IndexStats {
        match self.index.describe_stats(&self.index_name).await {
            Ok(stats) => stats,
            Err(e) => {
                error!("Failed to read index stats: {}", e);
                IndexStats::default()
            }
        }
    }

    /// Remove every vector from the index
    #[inline]
    pub async fn delete_all(&self) -> bool {
        warn!("Deleting all vectors from index '{}'", self.index_name);

        match self.index.delete_all(&self.index_name).await {
            Ok(()) => {
                info!("All vectors deleted from '{}'", self.index_name);
                true
            }
            Err(e) => {
                error!("Failed to delete vectors: {}", e);
                false
            }
        }
    }
}

/// Keep one entry per id, the last one wins and takes the first one's position
fn dedupe_by_id(entries: Vec<VectorEntry>) -> Vec<VectorEntry> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(entries.len());
    let mut unique: Vec<VectorEntry> = Vec::with_capacity(entries.len());

    for entry in entries {
        match positions.entry(entry.id.clone()) {
            Entry::Occupied(slot) => {
                warn!("Duplicate document id '{}' in batch, keeping the last", entry.id);
                unique[*slot.get()] = entry;
            }
            Entry::Vacant(slot) => {
                slot.insert(unique.len());
                unique.push(entry);
            }
        }
    }

    unique
}
