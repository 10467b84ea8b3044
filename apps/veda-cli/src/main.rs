use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};
use veda_client::{ClientError, Poller, PollerOptions, VedaClient, DEFAULT_BASE};

#[derive(Parser)]
#[command(name = "veda-cli", version, about = "Veda chat ledger utilities")]
struct Cli {
    #[command(flatten)]
    conn: ConnArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnArgs {
    /// Base URL of the service
    #[arg(long, global = true, default_value = DEFAULT_BASE)]
    base: String,
    /// Admin token; falls back to VEDA_ADMIN_TOKEN env
    #[arg(long, global = true, env = "VEDA_ADMIN_TOKEN", hide_env_values = true)]
    admin_token: Option<String>,
    /// Request timeout seconds
    #[arg(long, global = true, default_value_t = 70)]
    timeout: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the recent message window (JSON)
    Messages {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Send a chat message and print the reply
    Send {
        /// Wallet address to record the exchange under
        #[arg(long)]
        wallet: Option<String>,
        message: String,
    },
    /// Archive and reset the live chat (admin)
    Clear,
    /// Finish a partially applied reset (admin)
    Truncate {
        #[arg(long)]
        through_id: i64,
    },
    /// List archives (admin)
    Archives,
    /// Poll the recent window and print each new snapshot until Ctrl-C
    Watch {
        #[arg(long, default_value_t = 10)]
        interval_secs: u64,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Ping the service and print status
    Ping,
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Server-side failures still carry a JSON body worth showing.
fn report(err: ClientError) -> anyhow::Error {
    if let ClientError::Status { body, .. } = &err {
        if !body.is_null() {
            eprintln!(
                "{}",
                serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string())
            );
        }
    }
    anyhow::Error::new(err)
}

async fn run(cli: Cli) -> Result<()> {
    let client = VedaClient::new(
        &cli.conn.base,
        cli.conn.admin_token.as_deref(),
        Duration::from_secs(cli.conn.timeout.max(1)),
    )
    .context("building http client")?;

    match cli.command {
        Commands::Messages { limit } => {
            let rows = client.messages(limit).await.map_err(report)?;
            print_json(&json!({"messages": rows}))
        }
        Commands::Send { wallet, message } => {
            let reply = client
                .send(&message, wallet.as_deref())
                .await
                .map_err(report)?;
            print_json(&reply)
        }
        Commands::Clear => {
            let out = client.clear().await.map_err(report)?;
            print_json(&out)
        }
        Commands::Truncate { through_id } => {
            let out = client.truncate(through_id).await.map_err(report)?;
            print_json(&out)
        }
        Commands::Archives => {
            let archives = client.archives().await.map_err(report)?;
            print_json(&json!({"archives": archives}))
        }
        Commands::Watch {
            interval_secs,
            limit,
        } => watch(client, interval_secs, limit).await,
        Commands::Ping => {
            let health = client.healthz().await;
            let about = client.about().await.ok();
            print_json(&json!({
                "base": client.base(),
                "ok": health.is_ok(),
                "about": about,
            }))?;
            health.map(|_| ()).map_err(report)
        }
    }
}

async fn watch(client: VedaClient, interval_secs: u64, limit: Option<usize>) -> Result<()> {
    let poller = Poller::spawn(
        client,
        PollerOptions {
            interval: Duration::from_secs(interval_secs.max(1)),
            limit,
        },
    );
    let mut rx = poller.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = rx.borrow_and_update().clone();
                print_json(&json!({
                    "generation": snap.generation,
                    "messages": snap.messages,
                }))?;
            }
        }
    }
    poller.stop().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn send_parses_wallet_and_message() {
        let cli = Cli::try_parse_from(["veda-cli", "send", "--wallet", "W1", "hello there"])
            .expect("parse");
        assert_eq!(cli.conn.base, DEFAULT_BASE);
        match cli.command {
            Commands::Send { wallet, message } => {
                assert_eq!(wallet.as_deref(), Some("W1"));
                assert_eq!(message, "hello there");
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn global_base_applies_after_subcommand() {
        let cli = Cli::try_parse_from(["veda-cli", "messages", "--limit", "5", "--base", "http://h:1"])
            .expect("parse");
        assert_eq!(cli.conn.base, "http://h:1");
        assert!(matches!(cli.command, Commands::Messages { limit: Some(5) }));
    }

    #[tokio::test]
    async fn messages_command_hits_server() {
        use httpmock::prelude::*;
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/messages");
                then.status(200).json_body(json!({"messages": []}));
            })
            .await;
        let cli = Cli::try_parse_from(["veda-cli", "--base", &server.base_url(), "messages"])
            .expect("parse");
        run(cli).await.expect("run");
        mock.assert_async().await;
    }
}
