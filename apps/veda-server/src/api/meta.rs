use axum::response::IntoResponse;
use axum::{extract::State, Json};
use serde_json::json;

/// Health probe.
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "Meta",
    responses(
        (status = 200, description = "Service healthy", body = crate::openapi::HealthOk)
    )
)]
pub async fn healthz() -> impl IntoResponse {
    Json(json!({"ok": true}))
}

/// Service metadata and endpoints index.
#[utoipa::path(
    get,
    path = "/about",
    tag = "Meta",
    responses(
        (status = 200, description = "Service metadata", body = crate::openapi::AboutResponse)
    )
)]
pub async fn about(State(state): State<crate::AppState>) -> impl IntoResponse {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "recent_limit": state.recent_limit(),
        "endpoints": state.endpoints(),
    }))
}
