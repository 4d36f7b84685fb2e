//! services/api/src/documents/extract.rs
//!
//! Per-format text extraction and page counting for uploaded documents.
//! `try_extract` reports failures; `extract_text` is the fail-soft entry point
//! used by the corpus builder and never surfaces an error.

use docx_rs::{DocumentChild, ParagraphChild, RunChild};
use regex::Regex;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::LazyLock;
use summarizer_core::DocumentKind;
use tracing::warn;

/// Words assumed to fill one page of a format without real pagination.
pub const WORDS_PER_PAGE: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
}

/// Extracts raw text from a file on disk.
pub fn try_extract(path: &Path, kind: DocumentKind) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.display().to_string(),
        source,
    })?;
    try_extract_bytes(&bytes, kind)
}

/// Extracts raw text from in-memory document bytes.
pub fn try_extract_bytes(bytes: &[u8], kind: DocumentKind) -> Result<String, ExtractError> {
    match kind {
        DocumentKind::Txt => Ok(String::from_utf8_lossy(bytes).into_owned()),
        DocumentKind::Docx => docx_paragraphs(bytes).map(|paragraphs| paragraphs.join("\n")),
        DocumentKind::Pdf => {
            // pdf-extract panics on some malformed inputs instead of returning an error.
            match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes))) {
                Ok(Ok(text)) => Ok(text),
                Ok(Err(e)) => Err(ExtractError::Pdf(e.to_string())),
                Err(_) => Err(ExtractError::Pdf("the PDF parser panicked".to_string())),
            }
        }
    }
}

/// Cleaned text of a file, truncated to `max_chars` characters.
/// Any extraction failure yields an empty string.
pub fn extract_text(path: &Path, kind: DocumentKind, max_chars: usize) -> String {
    match try_extract(path, kind) {
        Ok(raw) => truncate_chars(&clean_text(&raw), max_chars),
        Err(e) => {
            warn!("Skipping unreadable {} file: {}", kind.extension(), e);
            String::new()
        }
    }
}

/// Page count used for quota enforcement. Zero means the document is unreadable.
pub fn count_pages(bytes: &[u8], kind: DocumentKind) -> u32 {
    match kind {
        DocumentKind::Pdf => {
            match panic::catch_unwind(AssertUnwindSafe(|| lopdf::Document::load_mem(bytes))) {
                Ok(Ok(doc)) => doc.get_pages().len() as u32,
                Ok(Err(e)) => {
                    warn!("Could not parse PDF for page count: {}", e);
                    0
                }
                Err(_) => 0,
            }
        }
        DocumentKind::Docx => match docx_paragraphs(bytes) {
            Ok(paragraphs) => estimate_pages(&paragraphs.join("\n")),
            Err(e) => {
                warn!("Could not parse DOCX for page count: {}", e);
                0
            }
        },
        DocumentKind::Txt => estimate_pages(&String::from_utf8_lossy(bytes)),
    }
}

/// `ceil(words / WORDS_PER_PAGE)`, never below one page.
pub fn estimate_pages(text: &str) -> u32 {
    let words = text.split_whitespace().count();
    words.div_ceil(WORDS_PER_PAGE).max(1) as u32
}

fn docx_paragraphs(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| ExtractError::Docx(e.to_string()))?;

    let paragraphs = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(para) => Some(
                para.children
                    .iter()
                    .filter_map(|pc| match pc {
                        ParagraphChild::Run(run) => Some(run.children.iter().fold(
                            String::new(),
                            |mut acc, rc| {
                                match rc {
                                    RunChild::Text(t) => acc.push_str(&t.text),
                                    RunChild::Break(_) => acc.push('\n'),
                                    _ => {}
                                }
                                acc
                            },
                        )),
                        _ => None,
                    })
                    .collect::<String>(),
            ),
            _ => None,
        })
        .collect();
    Ok(paragraphs)
}

static SPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
static NEWLINE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Removes NULs, collapses runs of spaces and tabs, and squeezes blank lines.
pub fn clean_text(text: &str) -> String {
    let text = text.replace('\0', " ").replace("\r\n", "\n");
    let text = SPACE_RUNS.replace_all(&text, " ");
    let text = NEWLINE_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Truncates on a character boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
