//! crates/summarizer_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{BucketTotals, SessionRecord};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("The external service did not answer within {0} seconds")]
    Timeout(u64),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistence of the per-bucket session metadata row.
#[async_trait]
pub trait SessionMetadataService: Send + Sync {
    /// Creates the row on first contact, otherwise refreshes `last_seen`,
    /// the IP hash and the user agent.
    async fn touch(
        &self,
        bucket_id: Uuid,
        ip_hash: Option<&str>,
        user_agent: Option<&str>,
    ) -> PortResult<SessionRecord>;

    /// Overwrites the mirrored totals with a fresh directory scan.
    async fn record_totals(&self, bucket_id: Uuid, totals: BucketTotals) -> PortResult<()>;

    /// Stamps `deleted_at` and zeroes the totals. The row itself is kept.
    async fn mark_deleted(&self, bucket_id: Uuid) -> PortResult<()>;

    async fn get_record(&self, bucket_id: Uuid) -> PortResult<SessionRecord>;
}

/// A single-shot text completion against an external language model.
#[async_trait]
pub trait LanguageModelService: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> PortResult<String>;
}
