//! Outbound HTTP client for the hosted assistant.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

pub(crate) const ASSISTANTS_BETA: (&str, &str) = ("OpenAI-Beta", "assistants=v2");

#[derive(Debug, thiserror::Error)]
pub(crate) enum ClientBuildError {
    #[error("api key is not a valid header value")]
    BadKey,
    #[error(transparent)]
    Build(#[from] reqwest::Error),
}

/// Socket-level knobs shared by every assistant call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Tuning {
    pub connect_timeout: Duration,
    pub keepalive: Duration,
    pub pool_idle: Duration,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            keepalive: Duration::from_secs(60),
            pool_idle: Duration::from_secs(90),
        }
    }
}

impl Tuning {
    /// `VEDA_HTTP_CONNECT_TIMEOUT_SECS`, `VEDA_HTTP_TCP_KEEPALIVE_SECS`,
    /// `VEDA_HTTP_POOL_IDLE_SECS`; unparsable or zero values keep the default.
    pub fn from_env() -> Self {
        let secs = |key: &str, default: Duration| {
            std::env::var(key)
                .ok()
                .and_then(|s| s.trim().parse::<u64>().ok())
                .filter(|n| *n > 0)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        let base = Self::default();
        Self {
            connect_timeout: secs("VEDA_HTTP_CONNECT_TIMEOUT_SECS", base.connect_timeout),
            keepalive: secs("VEDA_HTTP_TCP_KEEPALIVE_SECS", base.keepalive),
            pool_idle: secs("VEDA_HTTP_POOL_IDLE_SECS", base.pool_idle),
        }
    }
}

/// Client with the assistant's auth and beta headers baked in, bounded by
/// `request_timeout` per call.
pub(crate) fn assistant_client(
    api_key: &str,
    request_timeout: Duration,
    tuning: Tuning,
) -> Result<reqwest::Client, ClientBuildError> {
    let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
        .map_err(|_| ClientBuildError::BadKey)?;
    auth.set_sensitive(true);
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);
    headers.insert(ASSISTANTS_BETA.0, HeaderValue::from_static(ASSISTANTS_BETA.1));
    Ok(reqwest::Client::builder()
        .user_agent(format!("veda-server/{}", env!("CARGO_PKG_VERSION")))
        .default_headers(headers)
        .timeout(request_timeout)
        .connect_timeout(tuning.connect_timeout)
        .tcp_keepalive(tuning.keepalive)
        .pool_idle_timeout(tuning.pool_idle)
        .build()?)
}
