//! services/api/src/documents/corpus.rs
//!
//! Concatenates the text of a bucket's uploads into one bounded corpus.

use std::path::Path;
use summarizer_core::FileEntry;

use super::extract::extract_text;

/// Default character budget of a corpus.
pub const DEFAULT_CORPUS_CHARS: usize = 120_000;

const BLOCK_SEPARATOR: &str = "\n\n";

/// Metadata of one file that contributed to a corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusFile {
    pub name: String,
    pub extension: String,
    pub pages: u32,
    pub bytes: u64,
    pub chars: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub text: String,
    pub files: Vec<CorpusFile>,
}

impl Corpus {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

fn block_header(name: &str) -> String {
    format!("===== FILE: {} =====\n", name)
}

/// Builds the corpus from the files stored in `bucket_dir`, most recently
/// modified first. The whole corpus, labels included, stays within `max_chars`.
/// Files whose text comes out empty are skipped.
pub fn build_corpus(bucket_dir: &Path, files: &[FileEntry], max_chars: usize) -> Corpus {
    let mut ordered: Vec<&FileEntry> = files.iter().collect();
    ordered.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));

    let mut blocks: Vec<String> = Vec::new();
    let mut meta = Vec::new();
    let mut used = 0usize;

    for entry in ordered {
        let header = block_header(&entry.original_name);
        let separator = if blocks.is_empty() { 0 } else { BLOCK_SEPARATOR.len() };
        let overhead = header.chars().count() + separator;
        let remaining = max_chars.saturating_sub(used);
        if remaining <= overhead {
            break;
        }

        let content = extract_text(
            &bucket_dir.join(&entry.file_id),
            entry.kind,
            remaining - overhead,
        );
        if content.is_empty() {
            continue;
        }

        let chars = content.chars().count();
        used += overhead + chars;
        meta.push(CorpusFile {
            name: entry.original_name.clone(),
            extension: entry.kind.extension().to_string(),
            pages: entry.pages,
            bytes: entry.size_bytes,
            chars,
        });
        blocks.push(format!("{header}{content}"));
    }

    Corpus {
        text: blocks.join(BLOCK_SEPARATOR),
        files: meta,
    }
}
