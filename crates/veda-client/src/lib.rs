//! Typed HTTP client for veda-server plus a periodic message poller.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

mod poller;

pub use poller::{Poller, PollerOptions, Snapshot};

pub const DEFAULT_BASE: &str = "http://127.0.0.1:8092";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status} ({code})")]
    Status { status: u16, code: String, body: Value },
    #[error("admin token is not a valid header value")]
    InvalidToken,
}

impl ClientError {
    /// Stable server error code, when the server produced one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Status { code, .. } => Some(code),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub timestamp: String,
    pub wallet_address: String,
    pub query: String,
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub reply: String,
    pub is_winner: bool,
    pub wallet_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearOutcome {
    pub success: bool,
    pub archive_name: Option<String>,
    pub message_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveSummary {
    pub id: i64,
    pub archive_name: String,
    pub archive_date: String,
    pub message_count: usize,
}

#[derive(Deserialize)]
struct MessagesBody {
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct ArchivesBody {
    archives: Vec<ArchiveSummary>,
}

#[derive(Clone, Debug)]
pub struct VedaClient {
    base: String,
    http: reqwest::Client,
}

impl VedaClient {
    pub fn new(
        base: &str,
        admin_token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = admin_token.filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ClientError::InvalidToken)?;
            headers.insert(AUTHORIZATION, value);
        }
        let http = reqwest::Client::builder()
            .user_agent(format!("veda-client/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn healthz(&self) -> Result<Value, ClientError> {
        decode(self.http.get(self.url("/healthz")).send().await?).await
    }

    pub async fn about(&self) -> Result<Value, ClientError> {
        decode(self.http.get(self.url("/about")).send().await?).await
    }

    /// Recent window, oldest first. `None` uses the server default.
    pub async fn messages(&self, limit: Option<usize>) -> Result<Vec<Message>, ClientError> {
        let mut req = self.http.get(self.url("/messages"));
        if let Some(limit) = limit {
            req = req.query(&[("limit", limit)]);
        }
        let body: MessagesBody = decode(req.send().await?).await?;
        Ok(body.messages)
    }

    pub async fn send(&self, message: &str, wallet: Option<&str>) -> Result<ChatReply, ClientError> {
        let resp = self
            .http
            .post(self.url("/chat"))
            .json(&json!({"message": message, "walletAddress": wallet}))
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn clear(&self) -> Result<ClearOutcome, ClientError> {
        decode(self.http.post(self.url("/clear-chat")).send().await?).await
    }

    pub async fn truncate(&self, through_id: i64) -> Result<Value, ClientError> {
        let resp = self
            .http
            .post(self.url("/admin/archives/truncate"))
            .json(&json!({"throughId": through_id}))
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn archives(&self) -> Result<Vec<ArchiveSummary>, ClientError> {
        let body: ArchivesBody =
            decode(self.http.get(self.url("/admin/archives")).send().await?).await?;
        Ok(body.archives)
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json::<T>().await?);
    }
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    let code = body
        .get("error")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("http_{}", status.as_u16()));
    Err(ClientError::Status {
        status: status.as_u16(),
        code,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer, token: Option<&str>) -> VedaClient {
        VedaClient::new(&server.base_url(), token, Duration::from_secs(5)).expect("client")
    }

    #[tokio::test]
    async fn messages_decodes_window() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/messages").query_param("limit", "2");
                then.status(200).json_body(json!({"messages": [
                    {"id": 1, "timestamp": "t1", "walletAddress": "W1", "query": "q1", "response": "r1"},
                    {"id": 2, "timestamp": "t2", "walletAddress": "W2", "query": "q2", "response": "r2"}
                ]}));
            })
            .await;
        let rows = client(&server, None).messages(Some(2)).await.expect("messages");
        mock.assert_async().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].wallet_address, "W2");
    }

    #[tokio::test]
    async fn send_posts_camel_case_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat")
                    .json_body(json!({"message": "hi", "walletAddress": "W1"}));
                then.status(200)
                    .json_body(json!({"reply": "hello", "isWinner": false, "walletAddress": "W1"}));
            })
            .await;
        let reply = client(&server, None).send("hi", Some("W1")).await.expect("reply");
        assert_eq!(reply.reply, "hello");
        assert!(!reply.is_winner);
    }

    #[tokio::test]
    async fn clear_sends_admin_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/clear-chat")
                    .header("authorization", "Bearer tok");
                then.status(200).json_body(
                    json!({"success": true, "archiveName": "archive_x", "messageCount": 3}),
                );
            })
            .await;
        let out = client(&server, Some("tok")).clear().await.expect("clear");
        mock.assert_async().await;
        assert_eq!(out.message_count, 3);
        assert_eq!(out.archive_name.as_deref(), Some("archive_x"));
    }

    #[tokio::test]
    async fn server_error_code_is_surfaced() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/messages");
                then.status(503)
                    .json_body(json!({"status": 503, "error": "storage_unavailable"}));
            })
            .await;
        let err = client(&server, None).messages(None).await.unwrap_err();
        assert_eq!(err.code(), Some("storage_unavailable"));
        assert!(matches!(err, ClientError::Status { status: 503, .. }));
    }

    #[test]
    fn invalid_token_is_rejected() {
        let err = VedaClient::new(DEFAULT_BASE, Some("bad\ntoken"), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidToken));
    }
}
