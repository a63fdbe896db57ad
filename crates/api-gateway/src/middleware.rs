//! Request middleware

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the admin key
pub const X_KEY: &str = "x-key";

/// Rejects admin requests whose `x-key` header does not match the configured key
pub async fn require_admin_key(State(state): State<AppState>, request: Request<Body>, next: Next<Body>) -> Response {
    if let Some(expected) = state.admin_key.as_deref() {
        let provided = request.headers().get(X_KEY).and_then(|value| value.to_str().ok());

        if provided != Some(expected) {
            warn!("Rejected {} {}: invalid x-key", request.method(), request.uri().path());
            return ApiError::unauthorized().into_response();
        }
    }

    next.run(request).await
}

/// Logs every error response except plain not-found
pub async fn log_error_responses(request: Request<Body>, next: Next<Body>) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;
    let status = response.status();

    if status.as_u16() >= 400 && status != StatusCode::NOT_FOUND {
        error!("{} {} -> {}", method, path, status);
    }

    response
}
