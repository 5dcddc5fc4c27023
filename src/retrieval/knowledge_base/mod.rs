#[cfg(test)]
mod tests;

use async_trait::async_trait;
use itertools::Itertools;
use serde::Serialize;
use tracing::debug;

use super::CandidateRetriever;
use super::scoring::{RelevanceScorer, tokenize};
use crate::models::{CompanyRecord, ScoredCandidate, StartupProfile};

/// Lookup key for a company name: spaces and hyphens removed, lower-cased
#[inline]
pub fn normalize_key(name: &str) -> String {
    name.chars()
        .filter(|c| *c != ' ' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Outcome of a company-existence lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExistenceCheck {
    pub exists: bool,
    pub record: Option<CompanyRecord>,
    pub matched_key: Option<String>,
}

impl ExistenceCheck {
    #[inline]
    pub fn not_found() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnowledgeBaseStats {
    pub total_companies: usize,
    /// Distinct industries, sorted
    pub industries: Vec<String>,
    /// Company keys in store order
    pub companies: Vec<String>,
}

/// In-memory store of company records keyed by normalized name
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    entries: Vec<(String, CompanyRecord)>,
    scorer: RelevanceScorer,
}

impl KnowledgeBase {
    /// Build a knowledge base, keying each record by its normalized name.
    ///
    /// A later record with the same key replaces the earlier one in place.
    #[inline]
    pub fn new(records: impl IntoIterator<Item = CompanyRecord>) -> Self {
        let mut entries: Vec<(String, CompanyRecord)> = Vec::new();
        for record in records {
            let key = normalize_key(&record.name);
            match entries.iter_mut().find(|(existing, _)| *existing == key) {
                Some(entry) => entry.1 = record,
                None => entries.push((key, record)),
            }
        }

        Self {
            entries,
            scorer: RelevanceScorer::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_scorer(mut self, scorer: RelevanceScorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// The four reference companies used as retrieval fixtures
    #[inline]
    pub fn builtin() -> Self {
        Self::new(builtin_records())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records in store order
    #[inline]
    pub fn records(&self) -> impl Iterator<Item = &CompanyRecord> {
        self.entries.iter().map(|(_, record)| record)
    }

    /// Record stored under exactly this key
    #[inline]
    pub fn get(&self, key: &str) -> Option<&CompanyRecord> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, record)| record)
    }

    /// Check whether a company is known.
    ///
    /// The normalized name matches a key when either one contains the other,
    /// so short keys also match longer unrelated names ("uber" matches
    /// "uberx-logistics"). The first matching key in store order wins.
    #[inline]
    pub fn exists(&self, name: &str) -> ExistenceCheck {
        let query = normalize_key(name);
        if query.is_empty() {
            return ExistenceCheck::not_found();
        }

        self.entries
            .iter()
            .find(|(key, _)| key.contains(query.as_str()) || query.contains(key.as_str()))
            .map_or_else(ExistenceCheck::not_found, |(key, record)| {
                debug!("Company '{}' matched key '{}'", name, key);
                ExistenceCheck {
                    exists: true,
                    record: Some(record.clone()),
                    matched_key: Some(key.clone()),
                }
            })
    }

    #[inline]
    pub fn stats(&self) -> KnowledgeBaseStats {
        KnowledgeBaseStats {
            total_companies: self.entries.len(),
            industries: self
                .records()
                .map(|record| record.industry.clone())
                .sorted()
                .dedup()
                .collect(),
            companies: self.entries.iter().map(|(key, _)| key.clone()).collect(),
        }
    }

    /// Keyword lookup used by the search tool.
    ///
    /// A record whose key equals the normalized `company_name` comes first,
    /// followed by every record whose industry, problem or solution contains a
    /// query token. Without any match the first `k` records are returned. A
    /// pinned record that also matches the query appears twice.
    #[inline]
    pub fn keyword_search(
        &self,
        query: &str,
        company_name: Option<&str>,
        k: usize,
    ) -> Vec<&CompanyRecord> {
        let tokens = tokenize(query);
        let mut results = Vec::new();

        if let Some(pinned) = company_name.and_then(|name| self.get(&normalize_key(name))) {
            results.push(pinned);
        }

        results.extend(self.records().filter(|record| {
            [&record.industry, &record.problem, &record.solution]
                .into_iter()
                .any(|field| {
                    let field = field.to_lowercase();
                    tokens.iter().any(|token| field.contains(token.as_str()))
                })
        }));

        if results.is_empty() {
            results.extend(self.records().take(k));
        }

        results.truncate(k);
        results
    }

    /// Synchronous form of [`CandidateRetriever::find_similar`]
    #[inline]
    pub fn rank(&self, profile: &StartupProfile, top_k: usize) -> Vec<ScoredCandidate> {
        self.scorer.rank(profile, self.records(), top_k)
    }
}

#[async_trait]
impl CandidateRetriever for KnowledgeBase {
    async fn find_similar(&self, profile: &StartupProfile, top_k: usize) -> Vec<ScoredCandidate> {
        self.rank(profile, top_k)
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

fn builtin_records() -> Vec<CompanyRecord> {
    vec![
        CompanyRecord {
            id: "beelinguapp".to_string(),
            name: "Beelinguapp".to_string(),
            industry: "EdTech/Language Learning".to_string(),
            funding_stage: Some("Seed".to_string()),
            funding_amount: Some("$500K".to_string()),
            year: Some("2019".to_string()),
            business_model: "Freemium with premium subscriptions".to_string(),
            target_market: "Language learners aged 18-45".to_string(),
            competitive_advantage: "Unique story-based learning approach with native audio"
                .to_string(),
            problem: "Language learning is boring and ineffective with traditional methods"
                .to_string(),
            solution: "Learn languages by reading interesting stories with audio narration"
                .to_string(),
            description:
                "Language learning app that uses audiobooks and stories to teach languages"
                    .to_string(),
            key_metrics: "100K+ downloads, 15% conversion to premium".to_string(),
            monetization: "Premium subscriptions, in-app purchases".to_string(),
            lessons: "Focus on content quality over quantity, audio is crucial for language learning"
                .to_string(),
            success_factors: strings(&[
                "Engaging content",
                "Native audio quality",
                "Progressive difficulty",
            ]),
            source_document: None,
        },
        CompanyRecord {
            id: "airbnb".to_string(),
            name: "Airbnb".to_string(),
            industry: "Travel/Hospitality".to_string(),
            funding_stage: Some("Series A".to_string()),
            funding_amount: Some("$7.2M".to_string()),
            year: Some("2009".to_string()),
            business_model: "Commission-based (3% from guests, 3% from hosts)".to_string(),
            target_market: "Budget-conscious travelers and property owners".to_string(),
            competitive_advantage: "Community-driven platform with unique local experiences"
                .to_string(),
            problem: "Price is an important concern for customers booking travel online"
                .to_string(),
            solution: "Web platform where users can rent out their space to host travelers"
                .to_string(),
            description: "Platform for short-term accommodation rentals".to_string(),
            key_metrics: "2M nights booked, 89% customer satisfaction".to_string(),
            monetization: "Host and guest service fees".to_string(),
            lessons: "Build trust first, focus on user experience, leverage network effects"
                .to_string(),
            success_factors: strings(&["Trust & safety", "User experience", "Network effects"]),
            source_document: None,
        },
        CompanyRecord {
            id: "uber".to_string(),
            name: "Uber".to_string(),
            industry: "Transportation".to_string(),
            funding_stage: Some("Series A".to_string()),
            funding_amount: Some("$11M".to_string()),
            year: Some("2009".to_string()),
            business_model: "Commission from drivers (20-25%)".to_string(),
            target_market: "Urban professionals and frequent travelers".to_string(),
            competitive_advantage: "Technology-driven efficiency and convenience".to_string(),
            problem: "Taxi industry is inefficient and unreliable".to_string(),
            solution: "On-demand ride sharing through mobile app".to_string(),
            description: "On-demand ride-sharing platform".to_string(),
            key_metrics: "100K+ rides per month, 95% driver satisfaction".to_string(),
            monetization: "Commission from rides, delivery services".to_string(),
            lessons: "Technology can disrupt traditional industries, focus on convenience"
                .to_string(),
            success_factors: strings(&[
                "Technology platform",
                "Driver network",
                "User convenience",
            ]),
            source_document: None,
        },
        CompanyRecord {
            id: "dropbox".to_string(),
            name: "Dropbox".to_string(),
            industry: "Cloud Storage".to_string(),
            funding_stage: Some("Series A".to_string()),
            funding_amount: Some("$6M".to_string()),
            year: Some("2008".to_string()),
            business_model: "Freemium with paid storage tiers".to_string(),
            target_market: "Professionals and businesses needing file access".to_string(),
            competitive_advantage: "Simplicity and seamless synchronization".to_string(),
            problem: "File sharing and synchronization is complicated and unreliable"
                .to_string(),
            solution: "Simple cloud storage with automatic synchronization".to_string(),
            description: "Cloud storage and file synchronization service".to_string(),
            key_metrics: "4M users, 25% conversion to paid plans".to_string(),
            monetization: "Premium subscriptions, business plans".to_string(),
            lessons: "Simplicity wins, viral growth through referrals is powerful".to_string(),
            success_factors: strings(&["Simplicity", "Reliability", "Viral growth"]),
            source_document: None,
        },
    ]
}
