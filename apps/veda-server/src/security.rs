use axum::http::HeaderMap;
use sha2::Digest as _;

use crate::config::AdminConfig;

pub(crate) const ADMIN_HEADER: &str = "X-Veda-Admin";

fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}

pub(crate) fn presented_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .or_else(|| headers.get(ADMIN_HEADER).and_then(|h| h.to_str().ok()))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Gate for operator routes. Debug mode opens them; otherwise the configured
/// token (plain or SHA-256 hex) must be presented.
pub(crate) fn admin_ok(admin: &AdminConfig, headers: &HeaderMap) -> bool {
    if admin.debug {
        return true;
    }
    let Some(presented) = presented_token(headers) else {
        return false;
    };
    if let Some(want) = admin.token_sha256.as_deref() {
        let want = want.trim().to_ascii_lowercase();
        let got = hex::encode(sha2::Sha256::digest(presented.as_bytes()));
        if ct_eq(want.as_bytes(), got.as_bytes()) {
            return true;
        }
    }
    admin
        .token
        .as_deref()
        .map(|t| ct_eq(t.as_bytes(), presented.as_bytes()))
        .unwrap_or(false)
}
