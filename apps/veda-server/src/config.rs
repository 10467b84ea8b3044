use serde::Deserialize;
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use tracing::info;

use crate::oracle::OracleConfig;

const DEFAULT_BIND: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8092;
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("{0} is not set in environment variables")]
    Missing(&'static str),
    #[error("invalid {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error(
        "VEDA_BIND={bind} is public and VEDA_ADMIN_TOKEN/VEDA_ADMIN_TOKEN_SHA256 not set; refusing to start"
    )]
    MissingAdminToken { bind: String },
}

/// Optional TOML seed named by `VEDA_CONFIG`. Environment variables win over it.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    database_url: Option<String>,
    openai_api_key: Option<String>,
    openai_base_url: Option<String>,
    assistant_id: Option<String>,
    bind: Option<String>,
    port: Option<u16>,
    http_max_conc: Option<usize>,
    http_timeout_secs: Option<u64>,
    oracle_poll_ms: Option<u64>,
    oracle_max_wait_secs: Option<u64>,
    cache_capacity: Option<usize>,
    recent_limit: Option<usize>,
    win_phrase: Option<String>,
    admin_token: Option<String>,
    admin_token_sha256: Option<String>,
    admin_wallets: Option<Vec<String>>,
    debug: Option<bool>,
}

#[derive(Clone, Debug)]
pub(crate) struct HttpConfig {
    pub addr: SocketAddr,
    pub concurrency_limit: usize,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct AdminConfig {
    pub token: Option<String>,
    pub token_sha256: Option<String>,
    pub wallets: Vec<String>,
    pub debug: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct ServerConfig {
    pub database_url: String,
    pub oracle: OracleConfig,
    pub http: HttpConfig,
    pub cache_capacity: usize,
    pub recent_limit: usize,
    pub win_phrase: Option<String>,
    pub admin: AdminConfig,
}

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn pick(lookup: Lookup<'_>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| lookup(k))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_num<T: std::str::FromStr>(
    lookup: Lookup<'_>,
    key: &'static str,
    file: Option<T>,
    default: T,
) -> Result<T, ConfigError> {
    match pick(lookup, &[key]) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(file.unwrap_or(default)),
    }
}

fn truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "debug"
    )
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let lookup = |key: &str| std::env::var(key).ok();
        let file = match pick(&lookup, &["VEDA_CONFIG"]) {
            Some(path) => load_file(PathBuf::from(path))?,
            None => FileConfig::default(),
        };
        Self::resolve(&lookup, file)
    }

    fn resolve(lookup: Lookup<'_>, file: FileConfig) -> Result<Self, ConfigError> {
        let database_url = pick(lookup, &["VEDA_DATABASE_URL", "DATABASE_URL"])
            .or(file.database_url)
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let api_key = pick(lookup, &["VEDA_OPENAI_API_KEY", "OPENAI_API_KEY"])
            .or(file.openai_api_key)
            .ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;
        let base_url = pick(lookup, &["VEDA_OPENAI_BASE_URL"])
            .or(file.openai_base_url)
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        let assistant_id = pick(lookup, &["VEDA_ASSISTANT_ID"])
            .or(file.assistant_id)
            .ok_or(ConfigError::Missing("VEDA_ASSISTANT_ID"))?;

        let poll_ms = parse_num(lookup, "VEDA_ORACLE_POLL_MS", file.oracle_poll_ms, 1000)?;
        let max_wait_secs =
            parse_num(lookup, "VEDA_ORACLE_MAX_WAIT_SECS", file.oracle_max_wait_secs, 60)?;
        let timeout_secs =
            parse_num(lookup, "VEDA_HTTP_TIMEOUT_SECS", file.http_timeout_secs, 20)?;

        let bind = pick(lookup, &["VEDA_BIND"])
            .or(file.bind)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let port: u16 = parse_num(lookup, "VEDA_PORT", file.port, DEFAULT_PORT)?;
        let concurrency_limit: usize =
            parse_num(lookup, "VEDA_HTTP_MAX_CONC", file.http_max_conc, 1024)?;
        let addr = format!("{}:{}", bind, port)
            .parse()
            .map_err(|_| ConfigError::Invalid {
                key: "VEDA_BIND",
                value: bind.clone(),
            })?;

        let admin = AdminConfig {
            token: pick(lookup, &["VEDA_ADMIN_TOKEN"]).or(file.admin_token),
            token_sha256: pick(lookup, &["VEDA_ADMIN_TOKEN_SHA256"]).or(file.admin_token_sha256),
            wallets: match pick(lookup, &["VEDA_ADMIN_WALLETS", "ADMIN_WALLET_ADDRESSES"]) {
                Some(raw) => raw
                    .split(',')
                    .map(|w| w.trim().to_string())
                    .filter(|w| !w.is_empty())
                    .collect(),
                None => file.admin_wallets.unwrap_or_default(),
            },
            debug: pick(lookup, &["VEDA_DEBUG"])
                .map(|v| truthy(&v))
                .or(file.debug)
                .unwrap_or(false),
        };
        enforce_admin_token_guard(&bind, &admin)?;

        let cfg = Self {
            database_url,
            oracle: OracleConfig {
                api_key,
                base_url: base_url.trim_end_matches('/').to_string(),
                assistant_id,
                poll_interval: Duration::from_millis(poll_ms.max(10)),
                max_wait: Duration::from_secs(max_wait_secs.max(1)),
                request_timeout: Duration::from_secs(timeout_secs.max(1)),
            },
            http: HttpConfig {
                addr,
                concurrency_limit: concurrency_limit.max(1),
            },
            cache_capacity: parse_num(lookup, "VEDA_CACHE_CAPACITY", file.cache_capacity, 500)?
                .max(1),
            recent_limit: parse_num(lookup, "VEDA_RECENT_LIMIT", file.recent_limit, 20)?.max(1),
            win_phrase: pick(lookup, &["VEDA_WIN_PHRASE"]).or(file.win_phrase),
            admin,
        };
        info!(
            addr = %cfg.http.addr,
            cache_capacity = cfg.cache_capacity,
            recent_limit = cfg.recent_limit,
            debug = cfg.admin.debug,
            "resolved server config"
        );
        Ok(cfg)
    }
}

fn load_file(path: PathBuf) -> Result<FileConfig, ConfigError> {
    let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let file = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;
    info!(path = %path.display(), "loaded config file");
    Ok(file)
}

fn enforce_admin_token_guard(bind: &str, admin: &AdminConfig) -> Result<(), ConfigError> {
    let token_set = admin.token.is_some() || admin.token_sha256.is_some();
    let bind_lower = bind.trim().to_ascii_lowercase();
    let is_loopback = matches!(
        bind_lower.as_str(),
        "127.0.0.1" | "::1" | "[::1]" | "localhost"
    );
    if !is_loopback && !token_set {
        return Err(ConfigError::MissingAdminToken {
            bind: bind.to_string(),
        });
    }
    Ok(())
}
