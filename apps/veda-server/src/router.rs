use std::mem;

use axum::{
    handler::Handler,
    routing::{get, post},
    Router,
};

use crate::{api, AppState};

pub(crate) struct RouterBuilder {
    router: Router<AppState>,
    endpoints: Vec<String>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            endpoints: Vec::new(),
        }
    }

    pub fn route_get<H, T>(&mut self, path: &'static str, handler: H) -> &mut Self
    where
        H: Handler<T, AppState> + Clone + 'static,
        T: Send + 'static,
    {
        self.endpoints.push(format!("GET {}", path));
        let router = mem::take(&mut self.router);
        self.router = router.route(path, get(handler));
        self
    }

    pub fn route_post<H, T>(&mut self, path: &'static str, handler: H) -> &mut Self
    where
        H: Handler<T, AppState> + Clone + 'static,
        T: Send + 'static,
    {
        self.endpoints.push(format!("POST {}", path));
        let router = mem::take(&mut self.router);
        self.router = router.route(path, post(handler));
        self
    }

    pub fn build(self) -> (Router<AppState>, Vec<String>) {
        (self.router, self.endpoints)
    }
}

pub(crate) mod paths {
    pub const HEALTHZ: &str = "/healthz";
    pub const ABOUT: &str = "/about";
    pub const CHAT: &str = "/chat";
    pub const MESSAGES: &str = "/messages";
    pub const CLEAR_CHAT: &str = "/clear-chat";
    pub const COUNTER: &str = "/counter";
    pub const ADMIN_ARCHIVES: &str = "/admin/archives";
    pub const ADMIN_ARCHIVE: &str = "/admin/archives/{name}";
    pub const ADMIN_ARCHIVES_TRUNCATE: &str = "/admin/archives/truncate";
    pub const ADMIN_CHECK_WALLET: &str = "/admin/check-wallet";
    pub const ADMIN_VERIFY: &str = "/admin/verify";
    pub const SPEC_OPENAPI: &str = "/spec/openapi.json";
}

pub(crate) fn build_router() -> (Router<AppState>, Vec<String>) {
    let mut builder = RouterBuilder::new();
    builder
        .route_get(paths::HEALTHZ, api::meta::healthz)
        .route_get(paths::ABOUT, api::meta::about)
        .route_get(paths::SPEC_OPENAPI, api::spec::openapi_json)
        .route_post(paths::CHAT, api::chat::chat_post)
        .route_get(paths::CHAT, api::messages::messages_get)
        .route_get(paths::MESSAGES, api::messages::messages_get)
        .route_post(paths::MESSAGES, api::messages::messages_post)
        .route_post(paths::CLEAR_CHAT, api::archive::clear_chat)
        .route_post(paths::ADMIN_ARCHIVES_TRUNCATE, api::archive::archives_truncate)
        .route_get(paths::ADMIN_ARCHIVES, api::archive::archives_list)
        .route_get(paths::ADMIN_ARCHIVE, api::archive::archive_get)
        .route_get(paths::COUNTER, api::counter::counter_get)
        .route_post(paths::COUNTER, api::counter::counter_post)
        .route_get(paths::ADMIN_CHECK_WALLET, api::admin::check_wallet)
        .route_post(paths::ADMIN_VERIFY, api::admin::verify_wallet);
    builder.build()
}
