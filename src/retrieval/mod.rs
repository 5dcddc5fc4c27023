// Retrieval module
// Scores candidate records against a startup profile over the static
// knowledge base or the vector store

pub mod knowledge_base;
pub mod scoring;
pub mod vector;

use async_trait::async_trait;

use crate::models::{ScoredCandidate, StartupProfile};

pub use knowledge_base::{ExistenceCheck, KnowledgeBase, KnowledgeBaseStats, normalize_key};
pub use scoring::{RelevanceScorer, ScoringWeights, tokenize};
pub use vector::VectorRetriever;

/// Source of scored candidates for a startup profile
#[async_trait]
pub trait CandidateRetriever: Send + Sync {
    /// At most `top_k` candidates with a positive score, best first.
    ///
    /// Never fails: retrieval problems are logged and yield an empty result.
    async fn find_similar(&self, profile: &StartupProfile, top_k: usize) -> Vec<ScoredCandidate>;
}
