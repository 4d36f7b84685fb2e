//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `SessionMetadataService` port from the `core` crate. It keeps one
//! `user_sessions` row per bucket in PostgreSQL using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use summarizer_core::ports::{PortError, PortResult, SessionMetadataService};
use summarizer_core::{BucketTotals, SessionRecord};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `SessionMetadataService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const SELECT_COLUMNS: &str = "bucket_id, ip_hash, user_agent, first_seen, last_seen, \
                              files_count, total_pages, total_bytes, deleted_at";

#[derive(FromRow)]
struct UserSessionRecord {
    bucket_id: Uuid,
    ip_hash: Option<String>,
    user_agent: Option<String>,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    files_count: i32,
    total_pages: i32,
    total_bytes: i64,
    deleted_at: Option<DateTime<Utc>>,
}

impl UserSessionRecord {
    fn to_domain(self) -> SessionRecord {
        SessionRecord {
            bucket_id: self.bucket_id,
            ip_hash: self.ip_hash,
            user_agent: self.user_agent,
            first_seen: self.first_seen,
            last_seen: self.last_seen,
            totals: BucketTotals {
                files: self.files_count.max(0) as u32,
                bytes: self.total_bytes.max(0) as u64,
                pages: self.total_pages.max(0) as u32,
            },
            deleted_at: self.deleted_at,
        }
    }
}

fn not_found_or_unexpected(bucket_id: Uuid) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => {
            PortError::NotFound(format!("Session row for bucket {} not found", bucket_id))
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// `SessionMetadataService` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionMetadataService for DbAdapter {
    async fn touch(
        &self,
        bucket_id: Uuid,
        ip_hash: Option<&str>,
        user_agent: Option<&str>,
    ) -> PortResult<SessionRecord> {
        let query = format!(
            "INSERT INTO user_sessions (bucket_id, ip_hash, user_agent, first_seen, last_seen) \
             VALUES ($1, $2, $3, NOW(), NOW()) \
             ON CONFLICT (bucket_id) DO UPDATE SET \
                 last_seen = NOW(), \
                 ip_hash = COALESCE(EXCLUDED.ip_hash, user_sessions.ip_hash), \
                 user_agent = COALESCE(EXCLUDED.user_agent, user_sessions.user_agent) \
             RETURNING {SELECT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, UserSessionRecord>(&query)
            .bind(bucket_id)
            .bind(ip_hash)
            .bind(user_agent)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(record.to_domain())
    }

    async fn record_totals(&self, bucket_id: Uuid, totals: BucketTotals) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE user_sessions \
             SET files_count = $1, total_pages = $2, total_bytes = $3, last_seen = NOW() \
             WHERE bucket_id = $4",
        )
        .bind(totals.files as i32)
        .bind(totals.pages as i32)
        .bind(totals.bytes as i64)
        .bind(bucket_id)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Session row for bucket {} not found",
                bucket_id
            )));
        }
        Ok(())
    }

    async fn mark_deleted(&self, bucket_id: Uuid) -> PortResult<()> {
        sqlx::query(
            "UPDATE user_sessions \
             SET deleted_at = NOW(), files_count = 0, total_pages = 0, total_bytes = 0 \
             WHERE bucket_id = $1",
        )
        .bind(bucket_id)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn get_record(&self, bucket_id: Uuid) -> PortResult<SessionRecord> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM user_sessions WHERE bucket_id = $1");
        let record = sqlx::query_as::<_, UserSessionRecord>(&query)
            .bind(bucket_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_unexpected(bucket_id))?;
        Ok(record.to_domain())
    }
}
