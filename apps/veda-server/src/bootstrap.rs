use std::sync::Arc;

use tracing::warn;
use veda_kernel::{Kernel, MessageStore};

use crate::{
    access_log,
    chat::ChatService,
    config::{AdminConfig, ServerConfig},
    ledger::Ledger,
    oracle::{AssistantOracle, Oracle},
    router, AppState,
};

pub(crate) struct AssembleOptions {
    pub admin: AdminConfig,
    pub cache_capacity: usize,
    pub recent_limit: usize,
    pub win_phrase: Option<String>,
}

pub(crate) struct Assembled {
    pub router: axum::Router<()>,
    pub ledger: Arc<Ledger>,
}

/// Wire store and oracle into a stateless router.
pub(crate) fn assemble(
    store: Arc<dyn MessageStore>,
    oracle: Arc<dyn Oracle>,
    opts: AssembleOptions,
) -> Assembled {
    let ledger = Arc::new(Ledger::new(store, opts.cache_capacity));
    let chat = Arc::new(ChatService::new(oracle, ledger.clone(), opts.win_phrase));
    let (router, endpoints) = router::build_router();
    let state = AppState::builder(ledger.clone(), chat, opts.admin)
        .with_recent_limit(opts.recent_limit)
        .with_endpoints(Arc::new(endpoints))
        .build();
    Assembled {
        router: router.with_state(state),
        ledger,
    }
}

pub(crate) async fn build(cfg: &ServerConfig) -> anyhow::Result<axum::Router<()>> {
    let kernel = Kernel::open_url(&cfg.database_url)?;
    let store: Arc<dyn MessageStore> = Arc::new(kernel);
    let oracle: Arc<dyn Oracle> = Arc::new(AssistantOracle::new(cfg.oracle.clone())?);
    let assembled = assemble(
        store,
        oracle,
        AssembleOptions {
            admin: cfg.admin.clone(),
            cache_capacity: cfg.cache_capacity,
            recent_limit: cfg.recent_limit,
            win_phrase: cfg.win_phrase.clone(),
        },
    );
    // A failed warm-up is retried on the first read.
    if let Err(err) = assembled.ledger.initialize().await {
        warn!(code = err.code(), "message store not reachable at startup: {}", err);
    }
    Ok(assembled.router)
}

pub(crate) fn attach_http_layers(
    router: axum::Router<()>,
    concurrency_limit: usize,
) -> axum::Router<()> {
    use tower::limit::ConcurrencyLimitLayer;
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    router
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(ConcurrencyLimitLayer::new(concurrency_limit))
}

pub(crate) fn attach_global_layers(router: axum::Router<()>) -> axum::Router<()> {
    router.layer(axum::middleware::from_fn(access_log::access_log_mw))
}
