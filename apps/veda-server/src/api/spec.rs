use axum::Json;
use utoipa::OpenApi;

/// Generated OpenAPI document.
#[utoipa::path(get, path = "/spec/openapi.json", tag = "Specs", responses((status = 200, content_type = "application/json")))]
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(crate::openapi::ApiDoc::openapi())
}
