//! services/api/src/privacy.rs
//!
//! Client address handling. Raw addresses never leave this module.

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};
use std::net::SocketAddr;

/// Salted SHA-256 of the client address, hex encoded. A missing address
/// hashes to the empty string.
pub fn hash_ip(salt: &str, ip: Option<&str>) -> String {
    match ip.map(str::trim).filter(|ip| !ip.is_empty()) {
        Some(ip) => format!("{:x}", Sha256::digest(format!("{salt}{ip}").as_bytes())),
        None => String::new(),
    }
}

/// The first `X-Forwarded-For` entry when present, otherwise the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn hash_is_salted_and_stable() {
        let a = hash_ip("salt", Some("203.0.113.7"));
        assert_eq!(a.len(), 64);
        assert_eq!(a, hash_ip("salt", Some("203.0.113.7")));
        assert_ne!(a, hash_ip("pepper", Some("203.0.113.7")));
        assert!(!a.contains("203.0.113.7"));
        assert_eq!(hash_ip("salt", None), "");
        assert_eq!(hash_ip("salt", Some("  ")), "");
    }

    #[test]
    fn forwarded_header_wins_over_peer() {
        let peer: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer)).as_deref(), Some("10.0.0.1"));

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.2, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers, Some(peer)).as_deref(), Some("198.51.100.2"));
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }
}
