//! services/api/src/documents/mod.rs
//!
//! Reading uploaded documents and writing exported ones.

pub mod corpus;
pub mod export;
pub mod extract;
pub mod pdf_writer;

pub use corpus::{build_corpus, Corpus, CorpusFile};
pub use export::{export_document, save_copy, ExportError, ExportedFile};
pub use extract::{count_pages, extract_text, try_extract, ExtractError};
pub use pdf_writer::{EmbeddedFont, PdfFont};
