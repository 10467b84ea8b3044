use axum::extract::{ConnectInfo, MatchedPath};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use once_cell::sync::Lazy;
use sha2::Digest as _;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Clone, Debug)]
struct Cfg {
    enabled: bool,
    sample_n: u64,
    ua_hash: bool,
    trust_forward: bool,
}

fn flag(key: &str) -> bool {
    std::env::var(key).ok().as_deref() == Some("1")
}

static CFG: Lazy<Cfg> = Lazy::new(|| Cfg {
    enabled: flag("VEDA_ACCESS_LOG"),
    sample_n: std::env::var("VEDA_ACCESS_SAMPLE_N")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1)
        .max(1),
    ua_hash: flag("VEDA_ACCESS_UA_HASH"),
    trust_forward: flag("VEDA_TRUST_FORWARD_HEADERS"),
});

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn forwarded_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    let raw = headers.get("x-forwarded-for")?.to_str().ok()?;
    let ip = raw.split(',').next()?.trim();
    (!ip.is_empty()).then(|| ip.to_string())
}

/// One JSON line per request on the access target. Wallet addresses and
/// message bodies are never logged here.
pub async fn access_log_mw(req: Request<axum::body::Body>, next: Next) -> Response {
    if !CFG.enabled {
        return next.run(req).await;
    }
    let started = Instant::now();
    let method = req.method().clone();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|c| c.0.ip().to_string());
    let remote = if CFG.trust_forward {
        forwarded_ip(req.headers()).or(peer)
    } else {
        peer
    };
    let ua_hash = CFG
        .ua_hash
        .then(|| {
            req.headers()
                .get(axum::http::header::USER_AGENT)
                .and_then(|h| h.to_str().ok())
                .map(|ua| hex::encode(sha2::Sha256::digest(ua.as_bytes())))
        })
        .flatten();

    let res = next.run(req).await;
    let n = COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    if CFG.sample_n > 1 && n % CFG.sample_n != 0 {
        return res;
    }
    let mut obj = serde_json::json!({
        "ts": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "method": method.as_str(),
        "path": path,
        "status": res.status().as_u16(),
        "dur_ms": started.elapsed().as_millis() as u64,
    });
    if let Some(ip) = remote {
        obj["remote"] = serde_json::Value::String(ip);
    }
    if let Some(h) = ua_hash {
        obj["ua_hash"] = serde_json::Value::String(h);
    }
    tracing::info!(target: veda_otel::ACCESS_TARGET, "{}", obj);
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn forwarded_ip_takes_first_hop() {
        let mut h = HeaderMap::new();
        h.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(forwarded_ip(&h).as_deref(), Some("203.0.113.9"));
        assert_eq!(forwarded_ip(&HeaderMap::new()), None);
    }
}
