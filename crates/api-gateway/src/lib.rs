//! HTTP API for OpinionLens
//!
//! This crate provides the REST interface in front of the model lifecycle
//! manager: inference routes that predict with the default model and admin
//! routes that fetch, warm, cool, promote and delete models.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod rest;
pub mod routes;
pub mod state;
pub mod validation;

// Re-export commonly used types
pub use error::{ApiError, Surface};
pub use rest::RestApi;
pub use routes::router;
pub use state::{AppInfo, AppState};
