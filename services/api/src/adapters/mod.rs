pub mod db;
pub mod memory_db;
pub mod summarizer_llm;

pub use db::DbAdapter;
pub use memory_db::InMemoryMetadataAdapter;
pub use summarizer_llm::OpenAiSummarizerAdapter;
