use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use veda_kernel::StoreError;

/// Problem-style error body with a stable machine-readable `error` code.
///
/// Only the code and a short title reach the client; the underlying cause is
/// logged where the error is produced.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub title: &'static str,
    pub extra: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, title: &'static str) -> Self {
        Self {
            status,
            code,
            title,
            extra: None,
        }
    }

    /// Merge additional fields into the body (objects only).
    pub fn with(mut self, extra: Value) -> Self {
        match (&mut self.extra, extra) {
            (Some(Value::Object(current)), Value::Object(more)) => current.extend(more),
            (slot, more) => *slot = Some(more),
        }
        self
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", "Unauthorized")
    }

    pub fn bad_request(code: &'static str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, "Bad Request")
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", "Not Found")
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::Unavailable(_) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                err.code(),
                "Storage Unavailable",
            ),
            StoreError::Invalid(_) => Self::bad_request(err.code()),
            StoreError::PartialArchive {
                archive_name,
                through_id,
                message_count,
                ..
            } => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                err.code(),
                "Archive Partially Applied",
            )
            .with(json!({
                "archiveName": archive_name,
                "throughId": through_id,
                "messageCount": message_count,
            })),
            StoreError::Corrupt(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                err.code(),
                "Archive Corrupt",
            ),
            StoreError::NameTaken(name) => {
                Self::new(StatusCode::CONFLICT, err.code(), "Archive Name Taken")
                    .with(json!({ "archiveName": name }))
            }
            StoreError::NotArchived {
                through_id,
                archived_through,
            } => Self::new(StatusCode::CONFLICT, err.code(), "Rows Not Archived").with(json!({
                "throughId": through_id,
                "archivedThrough": archived_through,
            })),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let mut body = json!({
            "type": "about:blank",
            "title": self.title,
            "status": self.status.as_u16(),
            "error": self.code,
        });
        if let (Value::Object(map), Some(Value::Object(extra))) = (&mut body, self.extra) {
            map.extend(extra);
        }
        (self.status, Json(body)).into_response()
    }
}
