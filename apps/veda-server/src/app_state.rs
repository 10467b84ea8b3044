use std::sync::Arc;

use crate::chat::{ChatService, QueryCounter};
use crate::config::AdminConfig;
use crate::ledger::Ledger;
use crate::wallet_auth::AdminSessions;

#[derive(Clone)]
pub(crate) struct AppState {
    ledger: Arc<Ledger>,
    chat: Arc<ChatService>,
    counter: Arc<QueryCounter>,
    admin: Arc<AdminConfig>,
    sessions: Arc<AdminSessions>,
    recent_limit: usize,
    endpoints: Arc<Vec<String>>,
}

impl AppState {
    pub(crate) fn builder(
        ledger: Arc<Ledger>,
        chat: Arc<ChatService>,
        admin: AdminConfig,
    ) -> AppStateBuilder {
        AppStateBuilder {
            ledger,
            chat,
            admin,
            sessions: Arc::new(AdminSessions::default()),
            recent_limit: 20,
            endpoints: Arc::new(Vec::new()),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn chat(&self) -> &ChatService {
        &self.chat
    }

    pub fn counter(&self) -> &QueryCounter {
        &self.counter
    }

    pub fn admin(&self) -> &AdminConfig {
        &self.admin
    }

    pub fn sessions(&self) -> &AdminSessions {
        &self.sessions
    }

    pub fn recent_limit(&self) -> usize {
        self.recent_limit
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }
}

pub(crate) struct AppStateBuilder {
    ledger: Arc<Ledger>,
    chat: Arc<ChatService>,
    admin: AdminConfig,
    sessions: Arc<AdminSessions>,
    recent_limit: usize,
    endpoints: Arc<Vec<String>>,
}

impl AppStateBuilder {
    pub(crate) fn with_recent_limit(mut self, limit: usize) -> Self {
        self.recent_limit = limit.max(1);
        self
    }

    pub(crate) fn with_endpoints(mut self, endpoints: Arc<Vec<String>>) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub(crate) fn build(self) -> AppState {
        AppState {
            ledger: self.ledger,
            chat: self.chat,
            counter: Arc::new(QueryCounter::default()),
            admin: Arc::new(self.admin),
            sessions: self.sessions,
            recent_limit: self.recent_limit,
            endpoints: self.endpoints,
        }
    }
}
