// Document processing module
// Turns pitch-deck exports on disk into chunked, annotated documents

pub mod chunking;
pub mod extract;


use fancy_regex::Regex;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, error, info, warn};

use crate::config::DocumentConfig;
use crate::models::{COMPANY_NAME_KEY, DOCUMENT_ID_KEY, Document, MetadataValue};
use crate::{RagError, Result};

pub use chunking::{ChunkingConfig, split_text};
pub use extract::{DocumentFormat, ExtractedText, extract_text};

/// File extensions read by [`DocumentProcessor`]
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["txt", "md", "pdf", "pptx"];

static DISALLOWED_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[^\w\s.,!?;:\-()\[\]"'/%$&@#]"#).expect("valid regex")
});
static INLINE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("valid regex"));
static LEADING_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z]+)").expect("valid regex"));
static CAPITALIZED_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z][a-z]+)").expect("valid regex"));
static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(20\d{2})").expect("valid regex"));

/// Funding patterns in priority order, with the unit appended to the amount
static FUNDING_PATTERNS: LazyLock<Vec<(Regex, &'static str, &'static str)>> =
    LazyLock::new(|| {
        vec![
            (
                Regex::new(r"(?i)\$(\d+(?:\.\d+)?)\s*(?:million|mil|m)\b").expect("valid regex"),
                "$",
                "M",
            ),
            (
                Regex::new(r"(?i)\$(\d+(?:\.\d+)?)\s*(?:billion|bil|b)\b").expect("valid regex"),
                "$",
                "B",
            ),
            (
                Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*(?:million|mil|m)\b").expect("valid regex"),
                "",
                "M",
            ),
            (
                Regex::new(r"(?i)raise\s*\$?(\d+(?:\.\d+)?)").expect("valid regex"),
                "$",
                "",
            ),
            (
                Regex::new(r"(?i)funding\s*\$?(\d+(?:\.\d+)?)").expect("valid regex"),
                "$",
                "",
            ),
        ]
    });

/// Normalize extracted text.
///
/// Unsupported symbols become spaces, runs of spaces collapse, lines are
/// trimmed and consecutive blank lines collapse into one paragraph break.
#[inline]
pub fn clean_text(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n");
    let stripped = DISALLOWED_CHARS.replace_all(&normalized, " ");
    let collapsed = INLINE_WHITESPACE.replace_all(&stripped, " ");

    let mut paragraphs: Vec<Vec<&str>> = vec![Vec::new()];
    for line in collapsed.lines().map(str::trim) {
        if line.is_empty() {
            if paragraphs.last().is_some_and(|p| !p.is_empty()) {
                paragraphs.push(Vec::new());
            }
        } else if let Some(paragraph) = paragraphs.last_mut() {
            paragraph.push(line);
        }
    }

    paragraphs
        .iter()
        .filter(|paragraph| !paragraph.is_empty())
        .map(|paragraph| paragraph.join("\n"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn first_capture(regex: &Regex, haystack: &str) -> Option<String> {
    regex
        .captures(haystack)
        .ok()
        .flatten()
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

/// Lower-cased company name taken from a file name such as `Airbnb_2009.txt`
#[inline]
pub fn company_name_from_file(file_name: &str) -> Option<String> {
    first_capture(&LEADING_NAME, file_name)
        .or_else(|| first_capture(&CAPITALIZED_WORD, file_name))
        .map(|name| name.to_lowercase())
}

/// First `20xx` year in a file name
#[inline]
pub fn year_from_file(file_name: &str) -> Option<String> {
    first_capture(&YEAR, file_name)
}

/// First funding amount mentioned in the text, e.g. `$7.2M`
#[inline]
pub fn funding_amount(text: &str) -> Option<String> {
    FUNDING_PATTERNS.iter().find_map(|(regex, prefix, unit)| {
        first_capture(regex, text).map(|amount| format!("{}{}{}", prefix, amount, unit))
    })
}

fn document_hash(path: &Path) -> String {
    format!("{:x}", md5::compute(path.to_string_lossy().as_bytes()))
}

fn is_supported(path: &Path) -> bool {
    DocumentFormat::from_path(path).is_some()
}

/// Reads pitch-deck exports from a folder and chunks them for indexing
#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    data_dir: PathBuf,
    chunking: ChunkingConfig,
}

impl DocumentProcessor {
    #[inline]
    pub fn new(data_dir: impl Into<PathBuf>, config: &DocumentConfig) -> Self {
        Self {
            data_dir: data_dir.into(),
            chunking: ChunkingConfig {
                chunk_size: config.chunk_size,
                chunk_overlap: config.chunk_overlap,
            },
        }
    }

    #[inline]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Supported files directly inside the data folder, sorted by path
    #[inline]
    pub fn discover_files(&self) -> Result<Vec<PathBuf>> {
        if !self.data_dir.is_dir() {
            return Err(RagError::Document(format!(
                "Data folder {} does not exist",
                self.data_dir.display()
            )));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            if path.is_file() && is_supported(&path) {
                files.push(path);
            }
        }
        files.sort();

        debug!("Found {} files in {}", files.len(), self.data_dir.display());
        Ok(files)
    }

    /// Extract, clean and chunk a single file.
    ///
    /// PDF chunks carry `page_count` and PPTX chunks `slide_count`.
    /// Returns no documents when the file has no text after cleaning.
    #[inline]
    pub fn process_file(&self, path: &Path) -> Result<Vec<Document>> {
        let extracted = extract_text(path)?;
        let text = clean_text(&extracted.text);
        if text.is_empty() {
            warn!("No text extracted from {}", path.display());
            return Ok(Vec::new());
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_type = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let company_name = company_name_from_file(&file_name);
        let year = year_from_file(&file_name);
        let funding = funding_amount(&text);
        let hash = document_hash(path);

        let chunks = split_text(&text, &self.chunking);
        let total_chunks = chunks.len() as u32;

        let documents: Vec<Document> = chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| {
                let mut document = Document::new(chunk)
                    .with_metadata(DOCUMENT_ID_KEY, format!("{}_{}", hash, index))
                    .with_metadata("file_name", file_name.as_str())
                    .with_metadata("file_type", file_type.as_str())
                    .with_metadata("chunk_index", index as u32)
                    .with_metadata("total_chunks", total_chunks);
                if let Some(company_name) = &company_name {
                    document = document.with_metadata(COMPANY_NAME_KEY, company_name.as_str());
                }
                if let Some(year) = &year {
                    document = document.with_metadata("year", year.as_str());
                }
                if let Some(funding) = &funding {
                    document = document.with_metadata("funding_amount", funding.as_str());
                }
                if let Some(pages) = extracted.page_count {
                    document = document.with_metadata("page_count", pages);
                }
                if let Some(slides) = extracted.slide_count {
                    document = document.with_metadata("slide_count", slides);
                }
                document
            })
            .collect();

        info!("Processed {}: {} chunks created", file_name, documents.len());
        Ok(documents)
    }

    /// Process every supported file in the data folder.
    ///
    /// Files that cannot be read are logged and skipped.
    #[inline]
    pub fn process_all(&self) -> Result<Vec<Document>> {
        let files = self.discover_files()?;
        info!("Found {} files to process", files.len());

        let bar = if console::user_attended_stderr() {
            ProgressBar::new(files.len() as u64).with_style(
                ProgressStyle::with_template("{bar:30} [{pos}/{len}] Processing {msg}")
                    .expect("style template is valid"),
            )
        } else {
            ProgressBar::hidden()
        };

        let mut documents = Vec::new();
        for path in &files {
            bar.set_message(
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
            match self.process_file(path) {
                Ok(chunks) => documents.extend(chunks),
                Err(e) => error!("Error processing {}: {}", path.display(), e),
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        info!("Total documents created: {}", documents.len());
        Ok(documents)
    }
}

/// Per-file totals in a [`ProcessingSummary`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileSummary {
    pub chunks: usize,
    pub total_chars: usize,
    pub company: String,
    pub file_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessingSummary {
    pub total_chunks: usize,
    pub total_files: usize,
    /// Distinct company names, sorted
    pub companies: Vec<String>,
    pub files: BTreeMap<String, FileSummary>,
    pub average_chunk_size: f64,
}

/// Summarize processed documents by file and company
#[inline]
pub fn summarize(documents: &[Document]) -> ProcessingSummary {
    if documents.is_empty() {
        return ProcessingSummary::default();
    }

    let mut files: BTreeMap<String, FileSummary> = BTreeMap::new();
    let mut companies = BTreeSet::new();
    let mut total_chars = 0;

    for document in documents {
        let file_name = document.metadata_text("file_name").unwrap_or("unknown");
        let company = document.metadata_text(COMPANY_NAME_KEY).unwrap_or_default();
        let chars = document.text.chars().count();
        total_chars += chars;

        let file = files
            .entry(file_name.to_string())
            .or_insert_with(|| FileSummary {
                company: company.to_string(),
                file_type: document
                    .metadata
                    .get("file_type")
                    .map_or_else(|| "unknown".to_string(), MetadataValue::to_string),
                ..FileSummary::default()
            });
        file.chunks += 1;
        file.total_chars += chars;

        if !company.is_empty() {
            companies.insert(company.to_lowercase());
        }
    }

    ProcessingSummary {
        total_chunks: documents.len(),
        total_files: files.len(),
        companies: companies.into_iter().collect(),
        files,
        average_chunk_size: total_chars as f64 / documents.len() as f64,
    }
}
