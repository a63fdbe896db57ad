//! Route table

use axum::http::{header, HeaderName, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{inference, models, system};
use crate::middleware::{log_error_responses, require_admin_key, X_KEY};
use crate::state::AppState;

/// Builds the complete application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/api/v1", get(system::api_root))
        .route("/api/v1/about", get(system::about))
        .route("/api/v1/metrics", get(system::metrics))
        .merge(inference_routes())
        .merge(admin_routes(state.clone()))
        .layer(axum::middleware::from_fn(log_error_responses))
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}

fn inference_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/inference/predict",
            get(inference::predict).post(inference::predict_body),
        )
        .route("/api/v1/inference/batch_predict", post(inference::batch_predict))
}

/// Model administration, guarded by the `x-key` check
fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/models", get(models::list_models).post(models::fetch_model))
        .route("/api/v1/models/registry", get(models::registry_models))
        .route(
            "/api/v1/models/:model_id",
            get(models::get_model).delete(models::delete_model),
        )
        .route("/api/v1/models/:model_id/warm", post(models::warm_model))
        .route("/api/v1/models/:model_id/cool", post(models::cool_model))
        .route("/api/v1/models/:model_id/default", post(models::set_default_model))
        .route_layer(axum::middleware::from_fn_with_state(state, require_admin_key))
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::GET, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, HeaderName::from_static(X_KEY)])
}
