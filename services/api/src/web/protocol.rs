//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the browser client and the API server.

use serde::{Deserialize, Serialize};
use summarizer_core::{BucketTotals, FileEntry, GenerationOptions, Quotas, RawOptions};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::documents::CorpusFile;

//=========================================================================================
// Payloads Sent FROM the Client TO the Server
//=========================================================================================

/// A word target, accepted both as a JSON number and as a string.
#[derive(Deserialize, ToSchema, Debug, Clone)]
#[serde(untagged)]
pub enum WordsInput {
    Number(f64),
    Text(String),
}

impl WordsInput {
    fn into_raw(self) -> String {
        match self {
            WordsInput::Number(n) => format!("{}", n.trunc() as i64),
            WordsInput::Text(s) => s,
        }
    }
}

/// Generation options. Missing fields are taken from the session.
#[derive(Deserialize, ToSchema, Debug, Clone, Default)]
pub struct GenerateRequest {
    pub task: Option<String>,
    pub words: Option<WordsInput>,
    pub language: Option<String>,
    pub notes: Option<String>,
    pub output: Option<String>,
}

impl GenerateRequest {
    pub fn into_raw(self) -> RawOptions {
        RawOptions {
            task: self.task,
            words: self.words.map(WordsInput::into_raw),
            language: self.language,
            notes: self.notes,
            output: self.output,
        }
    }
}

#[derive(Deserialize, ToSchema, Debug, Clone, Default)]
pub struct ExportRequest {
    /// The (possibly edited) text to export. Defaults to the last generated result.
    pub result_text: Option<String>,
    /// `txt`, `docx` or `pdf`. Defaults to the output chosen at generation.
    pub output: Option<String>,
}

//=========================================================================================
// Payloads Sent FROM the Server TO the Client
//=========================================================================================

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct FileView {
    pub id: String,
    pub name: String,
    /// Upper-case extension, e.g. `PDF`.
    pub ext: String,
    pub pages: u32,
    pub size_bytes: u64,
}

impl From<&FileEntry> for FileView {
    fn from(entry: &FileEntry) -> Self {
        Self {
            id: entry.file_id.clone(),
            name: entry.original_name.clone(),
            ext: entry.kind.extension().to_ascii_uppercase(),
            pages: entry.pages,
            size_bytes: entry.size_bytes,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct LimitsView {
    pub max_files: u32,
    pub max_file_mb: u64,
    pub max_total_pages: u32,
    pub retention_hours: u64,
}

impl From<&Quotas> for LimitsView {
    fn from(quotas: &Quotas) -> Self {
        Self {
            max_files: quotas.max_files,
            max_file_mb: quotas.max_file_bytes / (1024 * 1024),
            max_total_pages: quotas.max_total_pages,
            retention_hours: quotas.retention.as_secs() / 3600,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsView {
    pub files: u32,
    pub pages: u32,
    pub bytes: u64,
}

impl From<BucketTotals> for StatsView {
    fn from(totals: BucketTotals) -> Self {
        Self {
            files: totals.files,
            pages: totals.pages,
            bytes: totals.bytes,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct OptionsView {
    pub task: String,
    pub words: u32,
    pub language: String,
    pub notes: String,
    pub output: String,
}

impl From<&GenerationOptions> for OptionsView {
    fn from(options: &GenerationOptions) -> Self {
        Self {
            task: options.task.as_str().to_string(),
            words: options.words,
            language: options.language.clone(),
            notes: options.notes.clone(),
            output: options.output.extension().to_string(),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct IndexResponse {
    pub bucket_id: Uuid,
    pub files: Vec<FileView>,
    pub limits: LimitsView,
    pub stats: StatsView,
    pub options: OptionsView,
    pub languages: Vec<String>,
    pub result_text: Option<String>,
    /// False when generations will use the offline fallback.
    pub llm_available: bool,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct UploadResponse {
    pub accepted: Vec<FileView>,
    /// One human-readable message per refused file.
    pub rejected: Vec<String>,
    pub stats: StatsView,
    pub message: String,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct RemoveResponse {
    pub removed: bool,
    pub file_id: String,
    pub stats: StatsView,
    pub message: String,
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct CorpusFileView {
    pub name: String,
    pub ext: String,
    pub pages: u32,
    pub size_bytes: u64,
    pub chars: usize,
}

impl From<&CorpusFile> for CorpusFileView {
    fn from(file: &CorpusFile) -> Self {
        Self {
            name: file.name.clone(),
            ext: file.extension.to_ascii_uppercase(),
            pages: file.pages,
            size_bytes: file.bytes,
            chars: file.chars,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct GenerateResponse {
    pub result_text: String,
    /// `model` or `fallback`.
    pub source: String,
    pub fallback_reason: Option<String>,
    pub options: OptionsView,
    /// The filename an export with the current options will carry.
    pub filename: String,
    pub corpus_files: Vec<CorpusFileView>,
    pub corpus_chars: usize,
    pub message: String,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct MessageResponse {
    pub ok: bool,
    pub message: String,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct HealthResponse {
    pub ok: bool,
    /// Current UTC time, RFC 3339.
    pub time: String,
}
