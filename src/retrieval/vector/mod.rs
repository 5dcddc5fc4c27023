
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::CandidateRetriever;
use super::scoring::RelevanceScorer;
use crate::database::VectorStore;
use crate::models::{CompanyRecord, ScoredCandidate, StartupProfile};

/// Retrieves candidates from the vector store and ranks them lexically.
///
/// The store narrows the field to the `candidate_pool` nearest hits for the
/// profile text. Hits are rebuilt into records, reduced to the closest hit per
/// company and scored with the same [`RelevanceScorer`] as the static path.
pub struct VectorRetriever {
    store: Arc<VectorStore>,
    scorer: RelevanceScorer,
    candidate_pool: usize,
}

impl VectorRetriever {
    #[inline]
    pub fn new(store: Arc<VectorStore>, candidate_pool: usize) -> Self {
        Self {
            store,
            scorer: RelevanceScorer::default(),
            candidate_pool,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_scorer(mut self, scorer: RelevanceScorer) -> Self {
        self.scorer = scorer;
        self
    }

    async fn candidates(&self, profile: &StartupProfile) -> Vec<CompanyRecord> {
        let query = profile.query_text();
        if query.is_empty() {
            warn!("Startup profile has no searchable text");
            return Vec::new();
        }

        let hits = self
            .store
            .search_similar(&query, self.candidate_pool, None)
            .await;

        let mut seen = HashSet::new();
        let records: Vec<CompanyRecord> = hits
            .iter()
            .map(CompanyRecord::from_hit)
            .filter(|record| seen.insert(candidate_key(record)))
            .collect();

        debug!(
            "Vector search returned {} hits for {} companies",
            hits.len(),
            records.len()
        );
        records
    }
}

/// Company name, or the hit id for chunks that carry no company
fn candidate_key(record: &CompanyRecord) -> String {
    let name = record.name.trim();
    if name.is_empty() {
        format!("id:{}", record.id)
    } else {
        format!("name:{}", name.to_lowercase())
    }
}

#[async_trait]
impl CandidateRetriever for VectorRetriever {
    async fn find_similar(&self, profile: &StartupProfile, top_k: usize) -> Vec<ScoredCandidate> {
        let records = self.candidates(profile).await;
        self.scorer.rank(profile, &records, top_k)
    }
}
