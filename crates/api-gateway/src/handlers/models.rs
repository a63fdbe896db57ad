//! Model administration routes

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use common::models::{BriefView, RecordView};
use model_manager::RegistryEntry;

use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::{model_id_from_path, FetchRequest, ListQuery};

/// Body of `GET /api/v1/models`
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ModelListing {
    /// Full records keyed by model id
    Full(BTreeMap<String, RecordView>),

    /// Short entries sorted by model id
    Brief(Vec<BriefView>),
}

/// `POST /api/v1/models`
pub async fn fetch_model(
    State(state): State<AppState>,
    Json(request): Json<FetchRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let reference = request.reference().map_err(ApiError::admin)?;
    let options = request.options();

    let outcome = state
        .manager
        .fetch_with(&reference, options)
        .await
        .map_err(ApiError::admin)?;

    let mut message = format!("Model '{}' saved at '{}'", outcome.model_id, outcome.path.display());
    if options.set_default && outcome.is_default {
        message.push_str(" and set as default");
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "model_id": outcome.model_id,
            "message": message,
        })),
    ))
}

/// `GET /api/v1/models?brief=&hot_only=`
pub async fn list_models(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Json<ModelListing> {
    let views = state.manager.list(query.hot_only);

    if query.brief {
        return Json(ModelListing::Brief(views.iter().map(RecordView::brief).collect()));
    }

    Json(ModelListing::Full(
        views
            .into_iter()
            .map(|view| (view.record.model_id.to_string(), view))
            .collect(),
    ))
}

/// `GET /api/v1/models/registry`
pub async fn registry_models(State(state): State<AppState>) -> Result<Json<Vec<RegistryEntry>>, ApiError> {
    let entries = state
        .manager
        .search_registry(&state.experiment)
        .await
        .map_err(ApiError::admin)?;

    Ok(Json(entries))
}

/// `GET /api/v1/models/:model_id`
pub async fn get_model(State(state): State<AppState>, Path(raw_id): Path<String>) -> Result<Json<RecordView>, ApiError> {
    let model_id = model_id_from_path(&raw_id).map_err(ApiError::admin)?;
    let view = state.manager.get(&model_id).map_err(ApiError::admin)?;
    Ok(Json(view))
}

/// `DELETE /api/v1/models/:model_id`
pub async fn delete_model(State(state): State<AppState>, Path(raw_id): Path<String>) -> Result<Json<Value>, ApiError> {
    let model_id = model_id_from_path(&raw_id).map_err(ApiError::admin)?;
    state.manager.delete(&model_id).await.map_err(ApiError::admin)?;

    Ok(Json(json!({
        "message": format!("Model '{}' was deleted successfully.", model_id),
    })))
}

/// `POST /api/v1/models/:model_id/warm`
pub async fn warm_model(State(state): State<AppState>, Path(raw_id): Path<String>) -> Result<Json<RecordView>, ApiError> {
    let model_id = model_id_from_path(&raw_id).map_err(ApiError::admin)?;
    state.manager.warm(&model_id).await.map_err(ApiError::admin)?;
    state.manager.get(&model_id).map(Json).map_err(ApiError::admin)
}

/// `POST /api/v1/models/:model_id/cool`
pub async fn cool_model(State(state): State<AppState>, Path(raw_id): Path<String>) -> Result<Json<RecordView>, ApiError> {
    let model_id = model_id_from_path(&raw_id).map_err(ApiError::admin)?;
    state.manager.cool(&model_id).await.map_err(ApiError::admin)?;
    state.manager.get(&model_id).map(Json).map_err(ApiError::admin)
}

/// `POST /api/v1/models/:model_id/default`
pub async fn set_default_model(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<RecordView>, ApiError> {
    let model_id = model_id_from_path(&raw_id).map_err(ApiError::admin)?;
    state.manager.set_default(&model_id).map_err(ApiError::admin)?;
    info!("Default model set to {} through the API", model_id);
    state.manager.get(&model_id).map(Json).map_err(ApiError::admin)
}
