use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::chat::APOLOGY;
use crate::{responses::ApiError, AppState};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub wallet_address: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: String,
    pub is_winner: bool,
    pub wallet_address: Option<String>,
}

/// Ask the oracle and record the exchange.
#[utoipa::path(
    post,
    path = "/chat",
    tag = "Chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Oracle reply", body = ChatResponse),
        (status = 400, description = "Malformed or empty message"),
        (status = 502, description = "Oracle failed or timed out; body carries an apology reply")
    )
)]
pub async fn chat_post(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = payload.map_err(|_| ApiError::bad_request("invalid_request"))?;
    if req.message.trim().is_empty() {
        return Err(ApiError::bad_request("empty_message"));
    }
    match state
        .chat()
        .ask(&req.message, req.wallet_address.as_deref())
        .await
    {
        Ok(out) => {
            tracing::debug!(persisted = out.persisted, winner = out.is_winner, "chat answered");
            Ok(Json(ChatResponse {
                reply: out.reply,
                is_winner: out.is_winner,
                wallet_address: req.wallet_address,
            }))
        }
        Err(err) => Err(
            ApiError::new(StatusCode::BAD_GATEWAY, err.code(), "Oracle Unavailable").with(json!({
                "reply": APOLOGY,
                "isWinner": false,
                "walletAddress": req.wallet_address,
            })),
        ),
    }
}
