
use crate::models::{CompanyRecord, ScoredCandidate, StartupProfile};

/// Points awarded per matching attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringWeights {
    pub industry: u32,
    pub business_model: u32,
    pub solution: u32,
    pub target_market: u32,
}

impl Default for ScoringWeights {
    #[inline]
    fn default() -> Self {
        Self {
            industry: 3,
            business_model: 2,
            solution: 2,
            target_market: 1,
        }
    }
}

/// Lower-cased whitespace-delimited tokens of a profile field
#[inline]
pub fn tokenize(field: &str) -> Vec<String> {
    field.split_whitespace().map(str::to_lowercase).collect()
}

fn any_token_in(tokens: &[String], candidate_field: &str) -> bool {
    if tokens.is_empty() || candidate_field.is_empty() {
        return false;
    }
    let candidate_field = candidate_field.to_lowercase();
    tokens.iter().any(|token| candidate_field.contains(token.as_str()))
}

/// Weighted lexical-overlap scoring of candidate records.
///
/// A profile token matches when it occurs as a substring of the lower-cased
/// candidate attribute. Each attribute contributes its weight at most once.
#[derive(Debug, Clone, Default)]
pub struct RelevanceScorer {
    weights: ScoringWeights,
}

impl RelevanceScorer {
    #[inline]
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    #[inline]
    pub fn weights(&self) -> ScoringWeights {
        self.weights
    }

    /// Relevance of `record` for `profile`
    #[inline]
    pub fn score(&self, profile: &StartupProfile, record: &CompanyRecord) -> u32 {
        let mut score = 0;

        if any_token_in(&tokenize(&profile.industry), &record.industry) {
            score += self.weights.industry;
        }
        if any_token_in(&tokenize(&profile.business_model), &record.business_model) {
            score += self.weights.business_model;
        }

        let solution_tokens = tokenize(&profile.solution);
        if any_token_in(&solution_tokens, &record.description)
            || any_token_in(&solution_tokens, &record.solution)
        {
            score += self.weights.solution;
        }

        if any_token_in(&tokenize(&profile.target_customer), &record.target_market) {
            score += self.weights.target_market;
        }

        score
    }

    /// Score every record, drop zero scores and keep the best `top_k`.
    ///
    /// Records with equal scores keep their input order.
    #[inline]
    pub fn rank<'a, I>(&self, profile: &StartupProfile, records: I, top_k: usize) -> Vec<ScoredCandidate>
    where
        I: IntoIterator<Item = &'a CompanyRecord>,
    {
        let mut candidates: Vec<ScoredCandidate> = records
            .into_iter()
            .filter_map(|record| {
                let relevance_score = self.score(profile, record);
                (relevance_score > 0).then(|| ScoredCandidate {
                    record: record.clone(),
                    relevance_score,
                })
            })
            .collect();

        // sort_by is stable
        candidates.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));
        candidates.truncate(top_k);
        candidates
    }
}
