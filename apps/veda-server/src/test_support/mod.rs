use once_cell::sync::Lazy;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use veda_kernel::memory::MemoryStore;

use crate::config::AdminConfig;
use crate::oracle::{Oracle, OracleError};

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub(crate) mod env {
    use super::*;

    /// Serializes env mutation across tests and restores every touched key on drop.
    pub(crate) struct EnvGuard {
        _lock: MutexGuard<'static, ()>,
        saved: HashMap<String, Option<String>>,
    }

    pub(crate) fn guard() -> EnvGuard {
        EnvGuard {
            _lock: ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner()),
            saved: HashMap::new(),
        }
    }

    impl EnvGuard {
        fn remember(&mut self, key: &str) {
            self.saved
                .entry(key.to_string())
                .or_insert_with(|| std::env::var(key).ok());
        }

        pub(crate) fn set(&mut self, key: &str, value: impl AsRef<str>) {
            self.set_opt(key, Some(value.as_ref()));
        }

        pub(crate) fn set_opt(&mut self, key: &str, value: Option<&str>) {
            self.remember(key);
            match value {
                Some(val) => std::env::set_var(key, val),
                None => std::env::remove_var(key),
            }
        }

        pub(crate) fn remove(&mut self, key: &str) {
            self.set_opt(key, None);
        }

        pub(crate) fn apply<'a, I>(&mut self, vars: I)
        where
            I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
        {
            for (key, value) in vars {
                self.set_opt(key, value);
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.saved.drain() {
                match value {
                    Some(val) => std::env::set_var(&key, val),
                    None => std::env::remove_var(&key),
                }
            }
        }
    }
}

enum FakeMode {
    Reply(String),
    Fail,
    Timeout,
}

/// Scripted oracle; counts calls.
pub(crate) struct FakeOracle {
    mode: FakeMode,
    calls: AtomicUsize,
}

impl FakeOracle {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self::with_mode(FakeMode::Reply(reply.into()))
    }

    pub fn failing() -> Self {
        Self::with_mode(FakeMode::Fail)
    }

    pub fn timing_out() -> Self {
        Self::with_mode(FakeMode::Timeout)
    }

    fn with_mode(mode: FakeMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Oracle for FakeOracle {
    async fn complete(&self, _prompt: &str) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            FakeMode::Reply(reply) => Ok(reply.clone()),
            FakeMode::Fail => Err(OracleError::Failed("failed".into())),
            FakeMode::Timeout => Err(OracleError::Timeout(Duration::from_secs(60))),
        }
    }
}

pub(crate) const ADMIN_TOKEN: &str = "test-admin-token";

pub(crate) fn admin_config() -> AdminConfig {
    AdminConfig {
        token: Some(ADMIN_TOKEN.into()),
        wallets: vec!["W-admin".into()],
        ..Default::default()
    }
}

/// Fully wired router over an in-memory store.
pub(crate) struct TestApp {
    pub router: axum::Router,
    pub store: Arc<MemoryStore>,
    pub oracle: Arc<FakeOracle>,
}

pub(crate) fn app(oracle: FakeOracle, admin: AdminConfig, win_phrase: Option<&str>) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let oracle = Arc::new(oracle);
    let assembled = crate::bootstrap::assemble(
        store.clone(),
        oracle.clone(),
        crate::bootstrap::AssembleOptions {
            admin,
            cache_capacity: 50,
            recent_limit: 20,
            win_phrase: win_phrase.map(String::from),
        },
    );
    TestApp {
        router: assembled.router,
        store,
        oracle,
    }
}
