use std::net::SocketAddr;

use tracing::{error, info, warn};

mod access_log;
mod api;
mod app_state;
mod bootstrap;
mod cache;
mod chat;
mod config;
mod http_client;
mod ledger;
mod openapi;
mod oracle;
mod responses;
mod router;
mod security;
mod wallet_auth;
#[cfg(test)]
mod test_support;

pub(crate) use app_state::AppState;

#[tokio::main]
async fn main() {
    veda_otel::init();

    let cfg = match config::ServerConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    };

    let router = match bootstrap::build(&cfg).await {
        Ok(router) => router,
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(2);
        }
    };
    let app = bootstrap::attach_global_layers(bootstrap::attach_http_layers(
        router,
        cfg.http.concurrency_limit,
    ));

    let listener = match tokio::net::TcpListener::bind(cfg.http.addr).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("error: bind {}: {err}", cfg.http.addr);
            std::process::exit(2);
        }
    };
    info!(addr = %cfg.http.addr, "veda-server listening");

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal());

    if let Err(err) = server.await {
        error!("http server exited with error: {err}");
    }
    info!("veda-server stopped");
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!("SIGTERM handler unavailable: {err}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received");
}
