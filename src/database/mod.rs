// Vector index abstraction
// The store talks to any backend implementing `VectorIndex`; LanceDB ships by default

pub mod lancedb;
pub mod vector_store;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::Result;
use crate::models::{Metadata, MetadataValue};

pub use self::lancedb::LanceIndex;
pub use vector_store::VectorStore;

/// Exact-match metadata constraints, all of which must hold
pub type MetadataFilter = BTreeMap<String, MetadataValue>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
    DotProduct,
}

impl DistanceMetric {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::DotProduct => "dotproduct",
        }
    }

    #[inline]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cosine" => Some(Self::Cosine),
            "euclidean" => Some(Self::Euclidean),
            "dotproduct" => Some(Self::DotProduct),
            _ => None,
        }
    }
}

/// Configuration of a named index as reported by the backend
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub ready: bool,
}

/// One stored vector with its metadata
#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: Metadata,
    /// Document text, truncated to the metadata size limit
    pub raw_text_preview: String,
}

/// A nearest-neighbour match returned by [`VectorIndex::query`]
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    pub id: String,
    /// Similarity, higher is closer
    pub score: f32,
    pub text: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceStats {
    pub vector_count: u64,
}

/// Aggregate statistics of an index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexStats {
    pub total_vectors: u64,
    pub dimension: usize,
    pub index_fullness: f32,
    pub namespaces: BTreeMap<String, NamespaceStats>,
}

/// Backing vector index service
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn list_indexes(&self) -> Result<Vec<String>>;

    /// Create a new index. Fails if the index already exists.
    async fn create_index(&self, name: &str, dimension: usize, metric: DistanceMetric)
    -> Result<()>;

    /// Describe an index, `None` when it does not exist
    async fn describe_index(&self, name: &str) -> Result<Option<IndexDescription>>;

    /// Insert or replace entries keyed by id, returning the number written
    async fn upsert(&self, index: &str, entries: Vec<VectorEntry>) -> Result<usize>;

    /// Up to `top_k` matches ordered by descending score
    async fn query(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexMatch>>;

    async fn delete_all(&self, index: &str) -> Result<()>;

    async fn describe_stats(&self, index: &str) -> Result<IndexStats>;
}
