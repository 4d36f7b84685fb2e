//! services/api/src/web/middleware.rs
//!
//! Bucket middleware: resolves the caller's bucket before any bucket route runs.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, warn};
use summarizer_core::ports::PortError;
use uuid::Uuid;

use crate::privacy::{client_ip, hash_ip};
use crate::web::session::{read_cookie, session_cookie, SESSION_COOKIE};
use crate::web::state::{AppState, BucketContext};

const MAX_USER_AGENT_CHARS: usize = 255;

/// Resolves or mints the bucket of the request and runs housekeeping.
///
/// A valid signed cookie selects an existing bucket unless its metadata row is
/// marked deleted; anything else mints a new one whose cookie is set on the
/// response. The metadata row is touched, expired
/// and over-quota buckets are removed, and a `BucketContext` is inserted into the
/// request extensions. Housekeeping failures are logged and never fail the request.
pub async fn bucket_context(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    // 1. Resolve the bucket from the signed cookie; a deleted bucket is never revived
    let signed = read_cookie(req.headers(), SESSION_COOKIE).and_then(|v| state.signer.verify(v));
    let existing = match signed {
        Some(bucket_id) => match state.metadata.get_record(bucket_id).await {
            Ok(record) if record.deleted_at.is_some() => {
                debug!("Cookie names a deleted bucket; minting a new one.");
                None
            }
            Ok(_) | Err(PortError::NotFound(_)) => Some(bucket_id),
            Err(e) => {
                warn!("Failed to read session metadata: {:?}", e);
                Some(bucket_id)
            }
        },
        None => None,
    };
    let context = match existing {
        Some(bucket_id) => BucketContext {
            bucket_id,
            is_new: false,
        },
        None => BucketContext {
            bucket_id: Uuid::new_v4(),
            is_new: true,
        },
    };

    // 2. Touch the anonymous metadata row
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip_hash = hash_ip(
        &state.config.ip_hash_salt,
        client_ip(req.headers(), peer).as_deref(),
    );
    let user_agent: Option<String> = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|ua| ua.chars().take(MAX_USER_AGENT_CHARS).collect());
    if let Err(e) = state
        .metadata
        .touch(
            context.bucket_id,
            Some(ip_hash.as_str()).filter(|h| !h.is_empty()),
            user_agent.as_deref(),
        )
        .await
    {
        warn!("Failed to touch session metadata: {:?}", e);
    }

    // 3. Retention sweep and storage ceiling. The bucket directory itself is
    // created by the first upload.
    let storage = state.storage.clone();
    let housekeeping = tokio::task::spawn_blocking(move || {
        storage.sweep_expired();
        storage.enforce_total_quota();
    })
    .await;
    if let Err(e) = housekeeping {
        error!("Bucket housekeeping task failed: {:?}", e);
    }

    state.sessions.touch(context.bucket_id).await;
    let pruned = state.sessions.prune().await;
    if pruned > 0 {
        debug!("Pruned {} idle session entries.", pruned);
    }

    // 4. Hand the context to the handler
    req.extensions_mut().insert(context);
    let mut response = next.run(req).await;

    // 5. Issue the cookie of a new bucket unless the handler set its own
    let handler_set_cookie = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&format!("{}=", SESSION_COOKIE)));
    if context.is_new && !handler_set_cookie {
        let cookie = session_cookie(
            &state.signer.sign(context.bucket_id),
            state.config.secure_cookies,
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => error!("Failed to encode the session cookie: {}", e),
        }
    }
    response
}
