use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::HeaderMap;
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use veda_kernel::{MessageRow, NewMessage};

use crate::api::{require_admin, LimitQuery};
use crate::{responses::ApiError, AppState};

#[derive(Debug, Serialize, ToSchema)]
pub struct MessagesResponse {
    #[schema(value_type = Vec<Object>)]
    pub messages: Vec<MessageRow>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppendRequest {
    pub wallet_address: String,
    pub query: String,
    pub response: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AppendResponse {
    pub success: bool,
    #[schema(value_type = Object)]
    pub message: MessageRow,
}

/// Recent window of the ledger, oldest first.
#[utoipa::path(
    get,
    path = "/messages",
    tag = "Messages",
    params(LimitQuery),
    responses(
        (status = 200, body = MessagesResponse),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn messages_get(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let Query(q) = query.map_err(|_| ApiError::bad_request("invalid_limit"))?;
    let messages = state
        .ledger()
        .recent(q.resolve(state.recent_limit()))
        .await?;
    Ok(Json(MessagesResponse { messages }))
}

/// Append a record directly (admin).
#[utoipa::path(
    post,
    path = "/messages",
    tag = "Messages",
    request_body = AppendRequest,
    responses(
        (status = 200, body = AppendResponse),
        (status = 400, description = "Missing or empty field"),
        (status = 401),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn messages_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<AppendRequest>, JsonRejection>,
) -> Result<Json<AppendResponse>, ApiError> {
    require_admin(&state, &headers)?;
    let Json(req) = payload.map_err(|_| ApiError::bad_request("invalid_request"))?;
    let new = NewMessage::new(req.wallet_address, req.query, req.response)?;
    let message = state.ledger().append(new).await?;
    Ok(Json(AppendResponse {
        success: true,
        message,
    }))
}
