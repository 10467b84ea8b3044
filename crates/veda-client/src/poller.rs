use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{Message, VedaClient};

#[derive(Clone, Debug)]
pub struct PollerOptions {
    pub interval: Duration,
    pub limit: Option<usize>,
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            limit: None,
        }
    }
}

/// Last successfully fetched window. `generation` counts successful refreshes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub messages: Vec<Message>,
    pub generation: u64,
}

/// Periodic reconciliation of the recent window.
///
/// Each successful fetch replaces the published snapshot wholesale. A failed
/// fetch is logged and the previous snapshot stays in place. Stopping abandons
/// a fetch still in flight; its response is never published.
pub struct Poller {
    rx: watch::Receiver<Snapshot>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn spawn(client: VedaClient, opts: PollerOptions) -> Self {
        let (tx, rx) = watch::channel(Snapshot::default());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(client, opts, tx, cancel.clone()));
        Self {
            rx,
            cancel,
            task: Some(task),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.rx.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.rx.borrow().clone()
    }

    /// Cancel polling and wait for the task to wind down.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    client: VedaClient,
    opts: PollerOptions,
    tx: watch::Sender<Snapshot>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(opts.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut generation = 0u64;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("poller stopped; abandoning in-flight fetch");
                break;
            }
            result = client.messages(opts.limit) => result,
        };
        if cancel.is_cancelled() {
            debug!("poller stopped; discarding late response");
            break;
        }
        match result {
            Ok(messages) => {
                generation += 1;
                tx.send_replace(Snapshot {
                    messages,
                    generation,
                });
            }
            Err(err) => {
                warn!(base = %client.base(), "message poll failed: {}", err);
            }
        }
    }
    debug!("poller exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn opts() -> PollerOptions {
        PollerOptions {
            interval: Duration::from_millis(20),
            limit: None,
        }
    }

    fn row(id: i64) -> serde_json::Value {
        json!({"id": id, "timestamp": "t", "walletAddress": "W1", "query": "q", "response": "r"})
    }

    async fn wait_for(rx: &mut watch::Receiver<Snapshot>, generation: u64) -> Snapshot {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if rx.borrow().generation >= generation {
                    return rx.borrow().clone();
                }
                rx.changed().await.expect("poller alive");
            }
        })
        .await
        .expect("snapshot in time")
    }

    #[tokio::test]
    async fn publishes_fetched_window() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/messages");
                then.status(200).json_body(json!({"messages": [row(1), row(2)]}));
            })
            .await;
        let client = VedaClient::new(&server.base_url(), None, Duration::from_secs(2)).unwrap();
        let poller = Poller::spawn(client, opts());
        let mut rx = poller.subscribe();
        let snap = wait_for(&mut rx, 2).await;
        assert_eq!(snap.messages.len(), 2);
        poller.stop().await;
    }

    #[tokio::test]
    async fn failure_keeps_previous_snapshot() {
        let server = MockServer::start_async().await;
        let ok = server
            .mock_async(|when, then| {
                when.method(GET).path("/messages");
                then.status(200).json_body(json!({"messages": [row(7)]}));
            })
            .await;
        let client = VedaClient::new(&server.base_url(), None, Duration::from_secs(2)).unwrap();
        let poller = Poller::spawn(client, opts());
        let mut rx = poller.subscribe();
        let before = wait_for(&mut rx, 1).await;

        ok.delete_async().await;
        let failing = server
            .mock_async(|when, then| {
                when.method(GET).path("/messages");
                then.status(503).json_body(json!({"error": "storage_unavailable"}));
            })
            .await;
        // let several failing polls land
        tokio::time::timeout(Duration::from_secs(5), async {
            while failing.hits_async().await < 3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("failing polls");
        let after = poller.snapshot();
        assert_eq!(after.messages, before.messages);
        assert!(after.messages.iter().any(|m| m.id == 7));
        poller.stop().await;
    }

    #[tokio::test]
    async fn stop_ends_polling() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/messages");
                then.status(200).json_body(json!({"messages": []}));
            })
            .await;
        let client = VedaClient::new(&server.base_url(), None, Duration::from_secs(2)).unwrap();
        let poller = Poller::spawn(client, opts());
        let mut rx = poller.subscribe();
        wait_for(&mut rx, 1).await;
        poller.stop().await;
        let hits = mock.hits_async().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(mock.hits_async().await, hits);
    }

    #[tokio::test]
    async fn late_response_after_stop_is_discarded() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/messages");
                then.status(200)
                    .delay(Duration::from_millis(200))
                    .json_body(json!({"messages": [row(1)]}));
            })
            .await;
        let client = VedaClient::new(&server.base_url(), None, Duration::from_secs(2)).unwrap();
        let poller = Poller::spawn(client, opts());
        let rx = poller.subscribe();
        // first fetch is in flight now
        tokio::time::sleep(Duration::from_millis(50)).await;
        poller.stop().await;
        assert_eq!(rx.borrow().generation, 0);
        assert!(rx.borrow().messages.is_empty());
    }

    #[tokio::test]
    async fn stop_does_not_wait_for_slow_fetch() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/messages");
                then.status(200)
                    .delay(Duration::from_secs(5))
                    .json_body(json!({"messages": [row(1)]}));
            })
            .await;
        let client = VedaClient::new(&server.base_url(), None, Duration::from_secs(30)).unwrap();
        let poller = Poller::spawn(client, opts());
        let rx = poller.subscribe();
        tokio::time::sleep(Duration::from_millis(50)).await;
        tokio::time::timeout(Duration::from_secs(1), poller.stop())
            .await
            .expect("stop returns before the fetch completes");
        assert_eq!(rx.borrow().generation, 0);
    }
}
