// Raw text extraction for the deck formats we ingest

#[cfg(test)]
pub(crate) mod fixtures;

use fancy_regex::Regex;
use lopdf::Document as PdfDocument;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

use super::first_capture;
use crate::{RagError, Result};

static SLIDE_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ppt/slides/slide(\d+)\.xml$").expect("valid regex"));

/// Container format of a deck file, decided by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Pdf,
    Pptx,
}

impl DocumentFormat {
    /// `None` for extensions we cannot read
    #[inline]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "md" => Some(Self::PlainText),
            "pdf" => Some(Self::Pdf),
            "pptx" => Some(Self::Pptx),
            _ => None,
        }
    }
}

/// Uncleaned text pulled out of one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: Option<u32>,
    pub slide_count: Option<u32>,
}

/// Read the text content of a supported file.
///
/// Pages and slides are separated by blank lines so they stay distinct paragraphs.
#[inline]
pub fn extract_text(path: &Path) -> Result<ExtractedText> {
    match DocumentFormat::from_path(path) {
        Some(DocumentFormat::PlainText) => Ok(ExtractedText {
            text: std::fs::read_to_string(path)?,
            ..ExtractedText::default()
        }),
        Some(DocumentFormat::Pdf) => extract_pdf(path),
        Some(DocumentFormat::Pptx) => extract_pptx(path),
        None => Err(RagError::Document(format!(
            "Unsupported file type: {}",
            path.display()
        ))),
    }
}

fn extract_pdf(path: &Path) -> Result<ExtractedText> {
    let document = PdfDocument::load(path).map_err(|e| {
        RagError::Document(format!("Failed to read PDF {}: {}", path.display(), e))
    })?;

    let pages = document.get_pages();
    let mut texts = Vec::with_capacity(pages.len());
    for &page_number in pages.keys() {
        match document.extract_text(&[page_number]) {
            Ok(text) => texts.push(text),
            Err(e) => debug!(
                "Skipping page {} of {}: {}",
                page_number,
                path.display(),
                e
            ),
        }
    }

    Ok(ExtractedText {
        text: texts.join("\n\n"),
        page_count: Some(pages.len() as u32),
        slide_count: None,
    })
}

fn extract_pptx(path: &Path) -> Result<ExtractedText> {
    let archive_error = |e: zip::result::ZipError| {
        RagError::Document(format!("Failed to read PPTX {}: {}", path.display(), e))
    };

    let mut archive = zip::ZipArchive::new(File::open(path)?).map_err(archive_error)?;

    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            first_capture(&SLIDE_ENTRY, name)
                .and_then(|number| number.parse().ok())
                .map(|number| (number, name.to_string()))
        })
        .collect();
    slides.sort_unstable();

    let mut texts = Vec::with_capacity(slides.len());
    for (_, name) in &slides {
        let mut xml = String::new();
        archive
            .by_name(name)
            .map_err(archive_error)?
            .read_to_string(&mut xml)?;
        texts.push(slide_text(&xml).map_err(|e| {
            RagError::Document(format!("Malformed slide {} in {}: {}", name, path.display(), e))
        })?);
    }

    Ok(ExtractedText {
        text: texts.join("\n\n"),
        page_count: None,
        slide_count: Some(slides.len() as u32),
    })
}

/// Text runs of one slide, a line per `a:p` paragraph
pub(crate) fn slide_text(xml: &str) -> std::result::Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut in_run = false;

    loop {
        match reader.read_event()? {
            Event::Start(tag) if tag.name().as_ref() == b"a:t" => in_run = true,
            Event::End(tag) => match tag.name().as_ref() {
                b"a:t" => in_run = false,
                b"a:p" => {
                    if !line.trim().is_empty() {
                        lines.push(line.trim().to_string());
                    }
                    line.clear();
                }
                _ => {}
            },
            Event::Empty(tag) if tag.name().as_ref() == b"a:br" => line.push(' '),
            Event::Text(text) if in_run => line.push_str(&text.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }
    if !line.trim().is_empty() {
        lines.push(line.trim().to_string());
    }

    Ok(lines.join("\n"))
}
