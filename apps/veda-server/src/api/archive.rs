use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::HeaderMap;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use veda_kernel::{ArchiveRow, ArchiveSummary};

use crate::api::{require_admin, LimitQuery};
use crate::{responses::ApiError, AppState};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClearChatResponse {
    pub success: bool,
    pub archive_name: Option<String>,
    pub message_count: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TruncateRequest {
    pub through_id: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TruncateResponse {
    pub success: bool,
    pub through_id: i64,
    pub removed: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ArchivesResponse {
    #[schema(value_type = Vec<Object>)]
    pub archives: Vec<ArchiveSummary>,
}

/// Archive every live message and empty the ledger (admin).
#[utoipa::path(
    post,
    path = "/clear-chat",
    tag = "Archives",
    responses(
        (status = 200, body = ClearChatResponse),
        (status = 401),
        (status = 409, description = "Archive name already used"),
        (status = 500, description = "Archive written but truncate failed; body carries throughId"),
        (status = 503, description = "Storage unavailable; nothing changed")
    )
)]
pub async fn clear_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ClearChatResponse>, ApiError> {
    require_admin(&state, &headers)?;
    match state.ledger().archive_and_reset().await {
        Ok(outcome) => Ok(Json(ClearChatResponse {
            success: true,
            archive_name: outcome.archive_name,
            message_count: outcome.message_count,
        })),
        Err(err) => Err(ApiError::from(err).with(json!({"success": false}))),
    }
}

/// Finish a partially applied reset by removing rows through `throughId` (admin).
#[utoipa::path(
    post,
    path = "/admin/archives/truncate",
    tag = "Archives",
    request_body = TruncateRequest,
    responses(
        (status = 200, body = TruncateResponse),
        (status = 401),
        (status = 409, description = "throughId is past the newest archived row"),
        (status = 503)
    )
)]
pub async fn archives_truncate(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<TruncateRequest>, JsonRejection>,
) -> Result<Json<TruncateResponse>, ApiError> {
    require_admin(&state, &headers)?;
    let Json(req) = payload.map_err(|_| ApiError::bad_request("invalid_request"))?;
    let out = state.ledger().truncate_through(req.through_id).await?;
    Ok(Json(TruncateResponse {
        success: true,
        through_id: req.through_id,
        removed: out.removed,
    }))
}

/// Archive summaries, newest first (admin).
#[utoipa::path(
    get,
    path = "/admin/archives",
    tag = "Archives",
    params(LimitQuery),
    responses((status = 200, body = ArchivesResponse), (status = 401), (status = 503))
)]
pub async fn archives_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<Json<ArchivesResponse>, ApiError> {
    require_admin(&state, &headers)?;
    let Query(q) = query.map_err(|_| ApiError::bad_request("invalid_limit"))?;
    let archives = state.ledger().archives(q.resolve(50)).await?;
    Ok(Json(ArchivesResponse { archives }))
}

/// One archive with its records (admin).
#[utoipa::path(
    get,
    path = "/admin/archives/{name}",
    tag = "Archives",
    params(("name" = String, Path, description = "Archive name")),
    responses((status = 200, body = serde_json::Value), (status = 401), (status = 404), (status = 503))
)]
pub async fn archive_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<Json<ArchiveRow>, ApiError> {
    require_admin(&state, &headers)?;
    state
        .ledger()
        .archive(&name)
        .await?
        .map(Json)
        .ok_or_else(ApiError::not_found)
}
