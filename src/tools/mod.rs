//! Closed set of retrieval operations exposed to an orchestration layer.
//!
//! Calls arrive as a tool name plus JSON arguments, are parsed into a
//! [`RagTool`] and dispatched explicitly by a [`Toolbox`].


use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::context::render_record;
use crate::database::VectorStore;
use crate::models::{CompanyRecord, SearchHit};
use crate::retrieval::KnowledgeBase;
use crate::{RagError, Result};

pub const SEARCH_TOOL: &str = "search";
pub const CHECK_EXISTS_TOOL: &str = "check_exists";

const DEFAULT_SEARCH_K: usize = 5;
const MAX_SEARCH_K: usize = 50;
const RESULT_SEPARATOR: &str = "\n\n";

/// Name, description and JSON schema of one tool
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RagTool {
    /// Find pitch decks relevant to a free-text query
    Search {
        query: String,
        company_name: Option<String>,
        k: usize,
    },
    /// Check whether a company already has a pitch deck on record
    CheckExists { company_name: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default = "default_search_k")]
    k: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CheckExistsArgs {
    company_name: String,
}

fn default_search_k() -> usize {
    DEFAULT_SEARCH_K
}

fn parse_args<T: for<'de> Deserialize<'de>>(tool: &str, arguments: &Value) -> Result<T> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments.clone()
    };
    serde_json::from_value(arguments)
        .map_err(|e| RagError::Tool(format!("Invalid arguments for {}: {}", tool, e)))
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl RagTool {
    /// Parse a call by tool name, validating its arguments
    #[inline]
    pub fn from_call(name: &str, arguments: &Value) -> Result<Self> {
        match name {
            SEARCH_TOOL => {
                let args: SearchArgs = parse_args(name, arguments)?;
                let query = non_blank(&args.query)
                    .ok_or_else(|| RagError::Tool("query must not be empty".to_string()))?;
                if !(1..=MAX_SEARCH_K).contains(&args.k) {
                    return Err(RagError::Tool(format!(
                        "k must be between 1 and {}, got {}",
                        MAX_SEARCH_K, args.k
                    )));
                }
                Ok(Self::Search {
                    query,
                    company_name: args.company_name.as_deref().and_then(non_blank),
                    k: args.k,
                })
            }
            CHECK_EXISTS_TOOL => {
                let args: CheckExistsArgs = parse_args(name, arguments)?;
                let company_name = non_blank(&args.company_name).ok_or_else(|| {
                    RagError::Tool("company_name must not be empty".to_string())
                })?;
                Ok(Self::CheckExists { company_name })
            }
            _ => Err(RagError::Tool(format!("Unknown tool: {}", name))),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Search { .. } => SEARCH_TOOL,
            Self::CheckExists { .. } => CHECK_EXISTS_TOOL,
        }
    }
}

/// Result of dispatching a tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// Dispatches [`RagTool`] calls against the knowledge base and, when
/// configured, the vector store
pub struct Toolbox {
    knowledge_base: KnowledgeBase,
    vector_store: Option<Arc<VectorStore>>,
}

impl Toolbox {
    #[inline]
    pub fn new(knowledge_base: KnowledgeBase) -> Self {
        Self {
            knowledge_base,
            vector_store: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_vector_store(mut self, store: Arc<VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Definitions of every tool, in dispatch order
    #[inline]
    pub fn definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: SEARCH_TOOL.to_string(),
                description: "Search the pitch deck database for similar companies and successful patterns".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Search query for finding relevant pitch deck information"
                        },
                        "company_name": {
                            "type": "string",
                            "description": "Optional: specific company to search for"
                        },
                        "k": {
                            "type": "integer",
                            "minimum": 1,
                            "maximum": MAX_SEARCH_K,
                            "description": format!("Number of results to return (default: {})", DEFAULT_SEARCH_K)
                        }
                    },
                    "required": ["query"],
                    "additionalProperties": false
                }),
            },
            ToolDefinition {
                name: CHECK_EXISTS_TOOL.to_string(),
                description: "Check if a specific company exists in the pitch deck database".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "company_name": {
                            "type": "string",
                            "description": "Name of the company to check"
                        }
                    },
                    "required": ["company_name"],
                    "additionalProperties": false
                }),
            },
        ]
    }

    /// Parse and dispatch a call; invalid calls produce an error output
    #[inline]
    pub async fn call(&self, name: &str, arguments: &Value) -> ToolOutput {
        match RagTool::from_call(name, arguments) {
            Ok(tool) => self.dispatch(&tool).await,
            Err(e) => {
                warn!("Rejected tool call '{}': {}", name, e);
                ToolOutput::error(e.to_string())
            }
        }
    }

    #[inline]
    pub async fn dispatch(&self, tool: &RagTool) -> ToolOutput {
        debug!("Dispatching tool: {:?}", tool);

        match tool {
            RagTool::Search {
                query,
                company_name,
                k,
            } => self.search(query, company_name.as_deref(), *k).await,
            RagTool::CheckExists { company_name } => self.check_exists(company_name).await,
        }
    }

    async fn search(&self, query: &str, company_name: Option<&str>, k: usize) -> ToolOutput {
        let Some(store) = &self.vector_store else {
            let records = self.knowledge_base.keyword_search(query, company_name, k);
            return ToolOutput::success(records.into_iter().map(render_record).join(RESULT_SEPARATOR));
        };

        let mut hits: Vec<SearchHit> = Vec::new();
        if let Some(company_name) = company_name {
            hits.extend(store.search_by_company(company_name, k).await);
        }
        hits.extend(store.search_similar(query, k, None).await);

        let blocks: Vec<String> = hits
            .iter()
            .unique_by(|hit| hit.id.as_str())
            .take(k)
            .map(|hit| {
                let record = CompanyRecord::from_hit(hit);
                let mut block = render_record(&record);
                // raw document chunks have no structured fields to show
                if record.industry.is_empty() {
                    let _ = writeln!(block, "Excerpt: {}", hit.content);
                }
                let _ = write!(block, "Similarity: {:.3}", hit.score);
                block
            })
            .collect();

        if blocks.is_empty() {
            ToolOutput::success(format!("No pitch decks found for '{}'.", query))
        } else {
            ToolOutput::success(blocks.join(RESULT_SEPARATOR))
        }
    }

    async fn check_exists(&self, company_name: &str) -> ToolOutput {
        let check = self.knowledge_base.exists(company_name);
        if let Some(key) = check.matched_key {
            return ToolOutput::success(format!(
                "Company '{}' EXISTS in our pitch deck database with historical funding data (matched '{}').",
                company_name, key
            ));
        }

        if let Some(store) = &self.vector_store {
            if store.company_exists(company_name).await {
                return ToolOutput::success(format!(
                    "Company '{}' EXISTS in the pitch deck index.",
                    company_name
                ));
            }
        }

        ToolOutput::success(format!(
            "Company '{}' NOT FOUND in database. This appears to be a new company.",
            company_name
        ))
    }
}
