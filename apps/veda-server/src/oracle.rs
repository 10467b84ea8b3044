//! Hosted assistant used to answer chat prompts.
//!
//! The assistant is driven through the thread/run protocol: create a thread,
//! post the user message, start a run, then poll the run until it reaches a
//! terminal status or the wait bound is exhausted.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub(crate) struct OracleConfig {
    pub api_key: String,
    pub base_url: String,
    pub assistant_id: String,
    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub request_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum OracleError {
    #[error("assistant run did not finish within {0:?}")]
    Timeout(Duration),
    #[error("assistant run ended with status {0}")]
    Failed(String),
    #[error("assistant request failed: {0}")]
    Transport(String),
}

impl OracleError {
    pub fn code(&self) -> &'static str {
        match self {
            OracleError::Timeout(_) => "oracle_timeout",
            OracleError::Failed(_) | OracleError::Transport(_) => "oracle_failed",
        }
    }
}

#[async_trait]
pub(crate) trait Oracle: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunStatus {
    Pending,
    Completed,
    Failed,
}

impl RunStatus {
    fn classify(raw: &str) -> Self {
        match raw {
            "completed" => RunStatus::Completed,
            "failed" | "cancelled" | "cancelling" | "expired" | "incomplete"
            | "requires_action" => RunStatus::Failed,
            // queued, in_progress, and anything newer than this client
            _ => RunStatus::Pending,
        }
    }
}

pub(crate) struct AssistantOracle {
    cfg: OracleConfig,
    client: reqwest::Client,
}

impl AssistantOracle {
    pub fn new(cfg: OracleConfig) -> Result<Self, OracleError> {
        let client = crate::http_client::assistant_client(
            &cfg.api_key,
            cfg.request_timeout,
            crate::http_client::Tuning::from_env(),
        )
        .map_err(|e| OracleError::Transport(e.to_string()))?;
        Ok(Self { cfg, client })
    }

    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, OracleError> {
        let url = format!("{}{}", self.cfg.base_url, path);
        let mut req = self.client.request(method, &url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        if !status.is_success() {
            debug!(%status, path, body = %String::from_utf8_lossy(&bytes), "assistant call rejected");
            return Err(OracleError::Transport(format!("{} returned {}", path, status)));
        }
        serde_json::from_slice(&bytes).map_err(|e| OracleError::Transport(e.to_string()))
    }

    async fn run_status(&self, thread_id: &str, run_id: &str) -> Result<String, OracleError> {
        let run = self
            .call(Method::GET, &format!("/v1/threads/{thread_id}/runs/{run_id}"), None)
            .await?;
        str_field(&run, "status")
    }
}

fn str_field(value: &Value, key: &str) -> Result<String, OracleError> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| OracleError::Transport(format!("response missing {key}")))
}

/// Text of the newest message in a `messages.list` payload.
fn latest_text(list: &Value) -> Option<String> {
    list.get("data")?
        .as_array()?
        .first()?
        .get("content")?
        .as_array()?
        .iter()
        .find(|part| part.get("type").and_then(|t| t.as_str()) == Some("text"))?
        .get("text")?
        .get("value")?
        .as_str()
        .map(|s| s.to_string())
}

#[async_trait]
impl Oracle for AssistantOracle {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let thread = self.call(Method::POST, "/v1/threads", Some(json!({}))).await?;
        let thread_id = str_field(&thread, "id")?;
        self.call(
            Method::POST,
            &format!("/v1/threads/{thread_id}/messages"),
            Some(json!({"role": "user", "content": prompt})),
        )
        .await?;
        let run = self
            .call(
                Method::POST,
                &format!("/v1/threads/{thread_id}/runs"),
                Some(json!({"assistant_id": self.cfg.assistant_id})),
            )
            .await?;
        let run_id = str_field(&run, "id")?;
        let mut status = str_field(&run, "status")?;

        let deadline = Instant::now() + self.cfg.max_wait;
        loop {
            match RunStatus::classify(&status) {
                RunStatus::Completed => break,
                RunStatus::Failed => {
                    warn!(thread_id, run_id, status, "assistant run failed");
                    return Err(OracleError::Failed(status));
                }
                RunStatus::Pending => {}
            }
            if Instant::now() >= deadline {
                warn!(thread_id, run_id, status, "assistant run timed out");
                return Err(OracleError::Timeout(self.cfg.max_wait));
            }
            tokio::time::sleep(self.cfg.poll_interval).await;
            status = self.run_status(&thread_id, &run_id).await?;
        }

        let messages = self
            .call(
                Method::GET,
                &format!("/v1/threads/{thread_id}/messages?order=desc&limit=1"),
                None,
            )
            .await?;
        latest_text(&messages)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| OracleError::Failed("empty_reply".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn oracle_for(server: &MockServer, max_wait: Duration) -> AssistantOracle {
        AssistantOracle::new(OracleConfig {
            api_key: "sk-test".into(),
            base_url: server.base_url(),
            assistant_id: "asst_test".into(),
            poll_interval: Duration::from_millis(10),
            max_wait,
            request_timeout: Duration::from_secs(5),
        })
        .expect("oracle")
    }

    async fn mock_thread_setup(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/threads")
                    .header("authorization", "Bearer sk-test")
                    .header("openai-beta", "assistants=v2");
                then.status(200).json_body(json!({"id": "thread_1"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/threads/thread_1/messages")
                    .json_body(json!({"role": "user", "content": "hi"}));
                then.status(200).json_body(json!({"id": "msg_user"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/threads/thread_1/runs")
                    .json_body(json!({"assistant_id": "asst_test"}));
                then.status(200)
                    .json_body(json!({"id": "run_1", "status": "queued"}));
            })
            .await;
    }

    async fn mock_run_status(server: &MockServer, status: &'static str) {
        server
            .mock_async(move |when, then| {
                when.method(GET).path("/v1/threads/thread_1/runs/run_1");
                then.status(200)
                    .json_body(json!({"id": "run_1", "status": status}));
            })
            .await;
    }

    #[test]
    fn run_status_classification() {
        assert_eq!(RunStatus::classify("completed"), RunStatus::Completed);
        assert_eq!(RunStatus::classify("queued"), RunStatus::Pending);
        assert_eq!(RunStatus::classify("in_progress"), RunStatus::Pending);
        assert_eq!(RunStatus::classify("failed"), RunStatus::Failed);
        assert_eq!(RunStatus::classify("expired"), RunStatus::Failed);
        assert_eq!(RunStatus::classify("requires_action"), RunStatus::Failed);
    }

    #[test]
    fn latest_text_picks_first_text_part() {
        let payload = json!({"data": [{"content": [
            {"type": "image_file", "image_file": {}},
            {"type": "text", "text": {"value": "hello"}}
        ]}]});
        assert_eq!(latest_text(&payload).as_deref(), Some("hello"));
        assert_eq!(latest_text(&json!({"data": []})), None);
    }

    #[tokio::test]
    async fn completed_run_returns_reply() {
        let server = MockServer::start_async().await;
        mock_thread_setup(&server).await;
        mock_run_status(&server, "completed").await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/threads/thread_1/messages");
                then.status(200).json_body(json!({"data": [{"role": "assistant", "content": [
                    {"type": "text", "text": {"value": "hello"}}
                ]}]}));
            })
            .await;
        let oracle = oracle_for(&server, Duration::from_secs(5));
        assert_eq!(oracle.complete("hi").await.expect("reply"), "hello");
    }

    #[tokio::test]
    async fn failed_run_is_classified() {
        let server = MockServer::start_async().await;
        mock_thread_setup(&server).await;
        mock_run_status(&server, "failed").await;
        let oracle = oracle_for(&server, Duration::from_secs(5));
        let err = oracle.complete("hi").await.unwrap_err();
        assert!(matches!(err, OracleError::Failed(ref s) if s == "failed"));
        assert_eq!(err.code(), "oracle_failed");
    }

    #[tokio::test]
    async fn stuck_run_times_out() {
        let server = MockServer::start_async().await;
        mock_thread_setup(&server).await;
        mock_run_status(&server, "in_progress").await;
        let oracle = oracle_for(&server, Duration::from_millis(60));
        let err = oracle.complete("hi").await.unwrap_err();
        assert!(matches!(err, OracleError::Timeout(_)));
        assert_eq!(err.code(), "oracle_timeout");
    }

    #[tokio::test]
    async fn rejected_request_is_transport_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/threads");
                then.status(401).json_body(json!({"error": {"message": "bad key"}}));
            })
            .await;
        let oracle = oracle_for(&server, Duration::from_secs(5));
        let err = oracle.complete("hi").await.unwrap_err();
        assert!(matches!(err, OracleError::Transport(_)));
    }
}
