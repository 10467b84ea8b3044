pub mod admin;
pub mod archive;
pub mod chat;
pub mod counter;
pub mod messages;
pub mod meta;
pub mod spec;

use axum::http::HeaderMap;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{responses::ApiError, AppState};

pub(crate) const MAX_LIMIT: usize = 200;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct LimitQuery {
    /// Number of rows to return; capped at 200. Zero yields an empty list.
    pub limit: Option<usize>,
}

impl LimitQuery {
    pub fn resolve(&self, default: usize) -> usize {
        self.limit.unwrap_or(default).min(MAX_LIMIT)
    }
}

/// Static admin token, debug mode, or a wallet session from `/admin/verify`.
pub(crate) fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let session = crate::security::presented_token(headers)
        .is_some_and(|token| state.sessions().is_valid(token));
    if session || crate::security::admin_ok(state.admin(), headers) {
        Ok(())
    } else {
        Err(ApiError::unauthorized())
    }
}
