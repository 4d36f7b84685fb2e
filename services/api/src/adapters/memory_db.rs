//! services/api/src/adapters/memory_db.rs
//!
//! A process-local `SessionMetadataService` used when no `DATABASE_URL` is
//! configured, and by the tests. Rows are lost on restart.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use summarizer_core::ports::{PortError, PortResult, SessionMetadataService};
use summarizer_core::{BucketTotals, SessionRecord};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryMetadataAdapter {
    rows: RwLock<HashMap<Uuid, SessionRecord>>,
}

impl InMemoryMetadataAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing(bucket_id: Uuid) -> PortError {
    PortError::NotFound(format!("Session row for bucket {} not found", bucket_id))
}

#[async_trait]
impl SessionMetadataService for InMemoryMetadataAdapter {
    async fn touch(
        &self,
        bucket_id: Uuid,
        ip_hash: Option<&str>,
        user_agent: Option<&str>,
    ) -> PortResult<SessionRecord> {
        let now = Utc::now();
        let mut rows = self.rows.write().await;
        let row = rows.entry(bucket_id).or_insert_with(|| SessionRecord {
            bucket_id,
            ip_hash: None,
            user_agent: None,
            first_seen: now,
            last_seen: now,
            totals: BucketTotals::default(),
            deleted_at: None,
        });
        row.last_seen = now;
        if let Some(hash) = ip_hash {
            row.ip_hash = Some(hash.to_string());
        }
        if let Some(agent) = user_agent {
            row.user_agent = Some(agent.to_string());
        }
        Ok(row.clone())
    }

    async fn record_totals(&self, bucket_id: Uuid, totals: BucketTotals) -> PortResult<()> {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(&bucket_id).ok_or_else(|| missing(bucket_id))?;
        row.totals = totals;
        row.last_seen = Utc::now();
        Ok(())
    }

    async fn mark_deleted(&self, bucket_id: Uuid) -> PortResult<()> {
        if let Some(row) = self.rows.write().await.get_mut(&bucket_id) {
            row.deleted_at = Some(Utc::now());
            row.totals = BucketTotals::default();
        }
        Ok(())
    }

    async fn get_record(&self, bucket_id: Uuid) -> PortResult<SessionRecord> {
        self.rows
            .read()
            .await
            .get(&bucket_id)
            .cloned()
            .ok_or_else(|| missing(bucket_id))
    }
}
