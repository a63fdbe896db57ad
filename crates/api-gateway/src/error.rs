//! Error translation at the HTTP boundary
//!
//! Every handler reports failures as an [`ApiError`]. The status code depends
//! on the error kind and on which family of routes raised it: a missing model
//! is "not found" on the admin routes but "cannot serve" on the inference
//! routes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use common::error::{Error, ErrorKind};

/// Route family an error is reported on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// `/api/v1/models/...`
    Admin,

    /// `/api/v1/inference/...`
    Inference,
}

/// Maps an error kind onto an HTTP status
pub fn status_for(kind: ErrorKind, surface: Surface) -> StatusCode {
    match kind {
        ErrorKind::Registry | ErrorKind::Operational => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::ModelNotAvailable => match surface {
            Surface::Admin => StatusCode::NOT_FOUND,
            Surface::Inference => StatusCode::SERVICE_UNAVAILABLE,
        },
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::Config | ErrorKind::Inference | ErrorKind::Io | ErrorKind::Serialization => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Error response with a `{"detail": ...}` body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// Translates an error raised on an admin route
    pub fn admin(err: Error) -> Self {
        Self::from_error(err, Surface::Admin)
    }

    /// Translates an error raised on an inference route
    pub fn inference(err: Error) -> Self {
        Self::from_error(err, Surface::Inference)
    }

    pub fn from_error(err: Error, surface: Surface) -> Self {
        let kind = err.kind();
        Self::new(status_for(kind, surface), format!("{}: {}", kind, err.detail()))
    }

    /// Missing or wrong `x-key` header
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Header 'x-key' contained an invalid key.")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
