//! Service-level routes

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::state::{AppInfo, AppState};

/// Prometheus text exposition format
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn api_root() -> Json<Value> {
    Json(json!({ "message": "Welcome to OpinionLens!" }))
}

pub async fn about(State(state): State<AppState>) -> Json<AppInfo> {
    Json(state.info.as_ref().clone())
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], state.metrics.render())
}
