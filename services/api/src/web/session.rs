//! services/api/src/web/session.rs
//!
//! Signed bucket cookies and the server-side session entries they point to.
//!
//! The cookie value is `<bucket uuid>.<base64url HMAC-SHA256 of the uuid>`, so a
//! client can neither forge nor guess another browser's bucket. Everything
//! else about a session (last options, last generated text) stays in memory.

use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use summarizer_core::RawOptions;
use tokio::sync::RwLock;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "summarizer_session";

type HmacSha256 = Hmac<Sha256>;

//=========================================================================================
// Cookie Signing
//=========================================================================================

#[derive(Clone)]
pub struct CookieSigner {
    mac: HmacSha256,
}

impl CookieSigner {
    pub fn new(secret: &str) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(secret.as_bytes())?,
        })
    }

    pub fn sign(&self, bucket_id: Uuid) -> String {
        let mut mac = self.mac.clone();
        mac.update(bucket_id.as_bytes());
        let tag = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{}.{}", bucket_id, tag)
    }

    /// Returns the bucket id of a correctly signed cookie value.
    pub fn verify(&self, value: &str) -> Option<Uuid> {
        let (id, tag) = value.split_once('.')?;
        let bucket_id = Uuid::parse_str(id).ok()?;
        let tag = URL_SAFE_NO_PAD.decode(tag).ok()?;
        let mut mac = self.mac.clone();
        mac.update(bucket_id.as_bytes());
        mac.verify_slice(&tag).ok()?;
        Some(bucket_id)
    }
}

/// Finds a cookie by name in the request headers.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            let (key, value) = c.trim().split_once('=')?;
            (key == name).then_some(value)
        })
}

/// A browser-session cookie (no `Max-Age`) carrying `value`.
pub fn session_cookie(value: &str, secure: bool) -> String {
    let mut cookie = format!("{}={}; HttpOnly; SameSite=Lax; Path=/", SESSION_COOKIE, value);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn expired_session_cookie(secure: bool) -> String {
    format!("{}; Max-Age=0", session_cookie("", secure))
}

//=========================================================================================
// Server-side Session Entries
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionData {
    /// The options of the last generation, already normalized.
    pub options: RawOptions,
    pub last_result: Option<String>,
    pub last_seen: DateTime<Utc>,
}

impl SessionData {
    fn fresh() -> Self {
        Self {
            options: RawOptions::default(),
            last_result: None,
            last_seen: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct SessionStore {
    entries: Arc<RwLock<HashMap<Uuid, SessionData>>>,
    idle_ttl: Duration,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            idle_ttl,
        }
    }

    /// The entry of a bucket, or an empty one if it has none.
    pub async fn get(&self, bucket_id: Uuid) -> SessionData {
        self.entries
            .read()
            .await
            .get(&bucket_id)
            .cloned()
            .unwrap_or_else(SessionData::fresh)
    }

    pub async fn touch(&self, bucket_id: Uuid) {
        self.update(bucket_id, |_| {}).await;
    }

    pub async fn update<F>(&self, bucket_id: Uuid, apply: F)
    where
        F: FnOnce(&mut SessionData),
    {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(bucket_id).or_insert_with(SessionData::fresh);
        apply(entry);
        entry.last_seen = Utc::now();
    }

    pub async fn remove(&self, bucket_id: Uuid) {
        self.entries.write().await.remove(&bucket_id);
    }

    /// Drops entries idle for longer than the TTL. Returns how many went.
    pub async fn prune(&self) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(self.idle_ttl) else {
            return 0;
        };
        let cutoff = Utc::now() - ttl;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, data| data.last_seen >= cutoff);
        before - entries.len()
    }
}
