pub mod domain;
pub mod generation;
pub mod options;
pub mod ports;
pub mod prompt;

pub use domain::{
    BucketTotals, DocumentKind, FileEntry, GenerationOptions, OutputFormat, Quotas, RawOptions,
    SessionRecord, TaskKind,
};
pub use generation::{Generation, GenerationSource, SummarizerService};
pub use ports::{LanguageModelService, PortError, PortResult, SessionMetadataService};
