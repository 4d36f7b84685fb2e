//! crates/summarizer_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// The kind of document the generation service is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Summary,
    Detailed,
    StudyNotes,
    Presentation,
}

impl TaskKind {
    /// The canonical option value, as echoed back to clients.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Summary => "summary",
            TaskKind::Detailed => "detailed",
            TaskKind::StudyNotes => "study-notes",
            TaskKind::Presentation => "presentation",
        }
    }

    /// Token used as the first segment of export filenames.
    pub fn filename_token(&self) -> &'static str {
        match self {
            TaskKind::Summary => "Summary",
            TaskKind::Detailed => "Detailed",
            TaskKind::StudyNotes => "StudyNotes",
            TaskKind::Presentation => "Presentation",
        }
    }

    /// Top-level heading of the offline scaffold for this task.
    pub fn heading(&self) -> &'static str {
        match self {
            TaskKind::Summary => "Executive Summary",
            TaskKind::Detailed => "Detailed Report",
            TaskKind::StudyNotes => "Study Notes",
            TaskKind::Presentation => "Presentation Outline",
        }
    }
}

/// Downloadable output format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Txt,
    Docx,
    Pdf,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Docx => "docx",
            OutputFormat::Pdf => "pdf",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Txt => "text/plain; charset=utf-8",
            OutputFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            OutputFormat::Pdf => "application/pdf",
        }
    }
}

/// The formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Txt,
}

impl DocumentKind {
    /// Resolves a kind from a bare extension (case-insensitive, with or without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "docx" => Some(DocumentKind::Docx),
            "txt" => Some(DocumentKind::Txt),
            _ => None,
        }
    }

    /// Resolves a kind from the extension of a file name.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Docx => "docx",
            DocumentKind::Txt => "txt",
        }
    }
}

/// Generation parameters as they arrive from a client or from the session,
/// before any validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOptions {
    pub task: Option<String>,
    pub words: Option<String>,
    pub language: Option<String>,
    pub notes: Option<String>,
    pub output: Option<String>,
}

/// Validated generation parameters. Built only through the option normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOptions {
    pub task: TaskKind,
    pub words: u32,
    pub language: String,
    pub notes: String,
    pub output: OutputFormat,
}

/// A file stored in a session bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// The generated storage name; doubles as the public file id.
    pub file_id: String,
    pub original_name: String,
    pub kind: DocumentKind,
    pub size_bytes: u64,
    pub pages: u32,
    pub modified_at: DateTime<Utc>,
}

/// Running totals of a bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketTotals {
    pub files: u32,
    pub bytes: u64,
    pub pages: u32,
}

impl BucketTotals {
    pub fn from_entries(entries: &[FileEntry]) -> Self {
        entries.iter().fold(Self::default(), |acc, e| Self {
            files: acc.files + 1,
            bytes: acc.bytes + e.size_bytes,
            pages: acc.pages + e.pages,
        })
    }
}

/// The anonymous metadata row tracked for every bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub bucket_id: Uuid,
    /// Salted hash of the client IP. The raw address is never stored.
    pub ip_hash: Option<String>,
    pub user_agent: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub totals: BucketTotals,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Storage limits applied to buckets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quotas {
    pub max_files: u32,
    pub max_file_bytes: u64,
    pub max_total_pages: u32,
    pub retention: Duration,
    pub max_storage_bytes: u64,
}

impl Default for Quotas {
    fn default() -> Self {
        Self {
            max_files: 10,
            max_file_bytes: 50 * 1024 * 1024,
            max_total_pages: 250,
            retention: Duration::from_secs(24 * 3600),
            max_storage_bytes: 2048 * 1024 * 1024,
        }
    }
}
