use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct CounterResponse {
    pub count: u64,
}

/// Queries counted since the process started.
#[utoipa::path(get, path = "/counter", tag = "Counter", responses((status = 200, body = CounterResponse)))]
pub async fn counter_get(State(state): State<AppState>) -> Json<CounterResponse> {
    Json(CounterResponse {
        count: state.counter().get(),
    })
}

#[utoipa::path(post, path = "/counter", tag = "Counter", responses((status = 200, body = CounterResponse)))]
pub async fn counter_post(State(state): State<AppState>) -> Json<CounterResponse> {
    Json(CounterResponse {
        count: state.counter().increment(),
    })
}
