//! Records, profiles and documents shared by the retrieval core.


use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;

/// Metadata attached to a document or an index entry
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Metadata key holding the caller-supplied document id
pub const DOCUMENT_ID_KEY: &str = "document_id";
/// Metadata key holding the lower-cased company name used for filtering
pub const COMPANY_NAME_KEY: &str = "company_name";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Number(f64),
}

impl MetadataValue {
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Number(_) => None,
        }
    }

    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Text(_) => None,
            Self::Number(number) => Some(*number),
        }
    }
}

impl fmt::Display for MetadataValue {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{}", number),
        }
    }
}

impl From<&str> for MetadataValue {
    #[inline]
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    #[inline]
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for MetadataValue {
    #[inline]
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<u32> for MetadataValue {
    #[inline]
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

/// A piece of text queued for embedding, with its metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub metadata: Metadata,
}

impl Document {
    #[inline]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    #[inline]
    pub fn metadata_text(&self, key: &str) -> Option<&str> {
        metadata_text(&self.metadata, key)
    }
}

/// Text value stored under `key`, if present
#[inline]
pub fn metadata_text<'a>(metadata: &'a Metadata, key: &str) -> Option<&'a str> {
    metadata.get(key).and_then(MetadataValue::as_text)
}

/// Where a record's text came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub file_name: String,
    pub file_type: String,
    pub chunk_index: u32,
}

/// One retrievable pitch-deck record.
///
/// Free-text attributes use the empty string for "no data".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub id: String,
    pub name: String,
    pub industry: String,
    pub funding_stage: Option<String>,
    pub funding_amount: Option<String>,
    pub year: Option<String>,
    pub business_model: String,
    pub target_market: String,
    pub competitive_advantage: String,
    pub problem: String,
    pub solution: String,
    pub description: String,
    pub key_metrics: String,
    pub monetization: String,
    pub lessons: String,
    pub success_factors: Vec<String>,
    pub source_document: Option<SourceDocument>,
}

const SUCCESS_FACTOR_SEPARATOR: &str = "; ";

impl CompanyRecord {
    /// Convert the record into an indexable document.
    ///
    /// Every populated attribute is written to the metadata so that
    /// [`CompanyRecord::from_hit`] can rebuild the record from a search hit.
    #[inline]
    pub fn to_document(&self) -> Document {
        let mut text = format!("{} ({})", self.name, self.industry);
        for (label, value) in [
            ("Problem", &self.problem),
            ("Solution", &self.solution),
            ("Description", &self.description),
            ("Business Model", &self.business_model),
            ("Target Market", &self.target_market),
            ("Competitive Advantage", &self.competitive_advantage),
            ("Key Metrics", &self.key_metrics),
        ] {
            if !value.is_empty() {
                let _ = write!(text, "\n{}: {}", label, value);
            }
        }

        let mut document = Document::new(text)
            .with_metadata(DOCUMENT_ID_KEY, self.id.as_str())
            .with_metadata(COMPANY_NAME_KEY, self.name.to_lowercase())
            .with_metadata("display_name", self.name.as_str());

        for (key, value) in [
            ("industry", &self.industry),
            ("business_model", &self.business_model),
            ("target_market", &self.target_market),
            ("competitive_advantage", &self.competitive_advantage),
            ("problem", &self.problem),
            ("solution", &self.solution),
            ("description", &self.description),
            ("key_metrics", &self.key_metrics),
            ("monetization", &self.monetization),
            ("lessons", &self.lessons),
        ] {
            if !value.is_empty() {
                document = document.with_metadata(key, value.as_str());
            }
        }

        for (key, value) in [
            ("funding_stage", &self.funding_stage),
            ("funding_amount", &self.funding_amount),
            ("year", &self.year),
        ] {
            if let Some(value) = value {
                document = document.with_metadata(key, value.as_str());
            }
        }

        if !self.success_factors.is_empty() {
            document = document.with_metadata(
                "success_factors",
                self.success_factors.join(SUCCESS_FACTOR_SEPARATOR),
            );
        }

        if let Some(source) = &self.source_document {
            document = document
                .with_metadata("file_name", source.file_name.as_str())
                .with_metadata("file_type", source.file_type.as_str())
                .with_metadata("chunk_index", source.chunk_index);
        }

        document
    }

    /// Rebuild a record from a vector-store hit.
    ///
    /// Hits from raw document chunks carry no structured attributes; their
    /// chunk text becomes the description so it still takes part in scoring.
    #[inline]
    pub fn from_hit(hit: &SearchHit) -> Self {
        let metadata = &hit.metadata;
        let text = |key: &str| metadata_text(metadata, key).unwrap_or_default().to_string();
        let optional = |key: &str| {
            metadata_text(metadata, key)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let name = optional("display_name").unwrap_or_else(|| text(COMPANY_NAME_KEY));
        let description = optional("description").unwrap_or_else(|| hit.content.clone());

        let source_document = optional("file_name").map(|file_name| SourceDocument {
            file_name,
            file_type: text("file_type"),
            chunk_index: metadata
                .get("chunk_index")
                .and_then(MetadataValue::as_number)
                .map_or(0, |index| index as u32),
        });

        Self {
            id: hit.id.clone(),
            name,
            industry: text("industry"),
            funding_stage: optional("funding_stage"),
            funding_amount: optional("funding_amount"),
            year: optional("year"),
            business_model: text("business_model"),
            target_market: text("target_market"),
            competitive_advantage: text("competitive_advantage"),
            problem: text("problem"),
            solution: text("solution"),
            description,
            key_metrics: text("key_metrics"),
            monetization: text("monetization"),
            lessons: text("lessons"),
            success_factors: optional("success_factors")
                .map(|factors| {
                    factors
                        .split(SUCCESS_FACTOR_SEPARATOR)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            source_document,
        }
    }
}

/// Description of the startup a pitch deck is being generated for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupProfile {
    pub startup_name: String,
    pub industry: String,
    pub business_model: String,
    pub solution: String,
    pub target_customer: String,
    pub problem: String,
    pub competitive_advantage: String,
}

impl StartupProfile {
    /// Text used to query the vector index for this profile
    #[inline]
    pub fn query_text(&self) -> String {
        [
            &self.industry,
            &self.business_model,
            &self.problem,
            &self.solution,
            &self.target_customer,
        ]
        .into_iter()
        .map(|field| field.trim())
        .filter(|field| !field.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// A record paired with its relevance score for one query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub record: CompanyRecord,
    pub relevance_score: u32,
}

/// Result of a nearest-neighbour query against the vector store
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    /// Similarity reported by the index, higher is closer
    pub score: f32,
}
