//! services/api/src/documents/export.rs
//!
//! Renders a generated text into a downloadable TXT, DOCX or PDF file.

use docx_rs::{BreakType, Docx, Paragraph, Run};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use summarizer_core::{GenerationOptions, OutputFormat};
use uuid::Uuid;

use super::pdf_writer::{render_pdf, PdfFont};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("There is no text to export.")]
    Empty,
    #[error("Could not build the DOCX file: {0}")]
    Docx(String),
    #[error("Could not build the PDF file: {0}")]
    Pdf(String),
}

/// A rendered export, ready to be sent as an attachment.
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub filename: String,
    pub format: OutputFormat,
    pub bytes: Vec<u8>,
}

impl ExportedFile {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// Strips surrounding whitespace and rejects texts with nothing left.
pub fn prepare_text(text: &str) -> Result<&str, ExportError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ExportError::Empty);
    }
    Ok(text)
}

/// Renders `text` in `format`, naming the file after the generation options.
pub fn export_document(
    text: &str,
    options: &GenerationOptions,
    format: OutputFormat,
    font: &PdfFont,
) -> Result<ExportedFile, ExportError> {
    let text = prepare_text(text)?;
    let bytes = match format {
        OutputFormat::Txt => render_txt(text),
        OutputFormat::Docx => render_docx(text)?,
        OutputFormat::Pdf => render_pdf(text, font)?,
    };
    Ok(ExportedFile {
        filename: format!("{}.{}", options.base_filename(), format.extension()),
        format,
        bytes,
    })
}

pub fn render_txt(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// One paragraph per blank-line separated block; lines inside a block are runs
/// joined by line breaks.
pub fn render_docx(text: &str) -> Result<Vec<u8>, ExportError> {
    let normalized = text.replace("\r\n", "\n");
    let mut docx = Docx::new();

    for block in normalized.split("\n\n") {
        let block = block.trim_matches('\n');
        if block.trim().is_empty() {
            continue;
        }
        let lines: Vec<&str> = block.lines().collect();
        let mut paragraph = Paragraph::new();
        for (i, line) in lines.iter().enumerate() {
            let mut run = Run::new().add_text(*line);
            if i + 1 < lines.len() {
                run = run.add_break(BreakType::TextWrapping);
            }
            paragraph = paragraph.add_run(run);
        }
        docx = docx.add_paragraph(paragraph);
    }

    let mut buffer = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buffer)
        .map_err(|e| ExportError::Docx(e.to_string()))?;
    Ok(buffer.into_inner())
}

/// Keeps a copy of a DOCX or PDF export under `<output_root>/<bucket_id>/`.
/// TXT exports are not kept.
pub fn save_copy(
    output_root: &Path,
    bucket_id: Uuid,
    file: &ExportedFile,
) -> std::io::Result<Option<PathBuf>> {
    if file.format == OutputFormat::Txt {
        return Ok(None);
    }
    let dir = output_root.join(bucket_id.to_string());
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(&file.filename);
    std::fs::write(&path, &file.bytes)?;
    Ok(Some(path))
}
