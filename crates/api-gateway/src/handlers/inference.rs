//! Inference routes
//!
//! Every route predicts with the current default model. Metrics are recorded
//! on a spawned task once the prediction is done, so the response never waits
//! on the recorder.

use std::time::Instant;

use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;
use tracing::debug;

use common::error::Error;
use common::types::Sentiment;
use performance_monitor::{record_batch, record_prediction, BatchSample, PredictionSample};

use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::PredictRequest;

/// Metric label of the single-text routes
pub const PREDICT_ENDPOINT: &str = "/predict";

/// Metric label of the batch route
pub const BATCH_PREDICT_ENDPOINT: &str = "/batch_predict";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PredictionResponse {
    pub prediction: Sentiment,
}

/// `GET /api/v1/inference/predict?text=...`
pub async fn predict(
    State(state): State<AppState>,
    Query(request): Query<PredictRequest>,
) -> Result<Json<PredictionResponse>, ApiError> {
    predict_text(&state, request.text)
}

/// `POST /api/v1/inference/predict` with `{"text": ...}`
pub async fn predict_body(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictionResponse>, ApiError> {
    predict_text(&state, request.text)
}

fn predict_text(state: &AppState, text: String) -> Result<Json<PredictionResponse>, ApiError> {
    let model = state.manager.get_default_model().map_err(ApiError::inference)?;

    let start = Instant::now();
    let sentiment = model.predict(&text).map_err(ApiError::inference)?;
    let elapsed = start.elapsed();

    let sample = PredictionSample {
        endpoint: PREDICT_ENDPOINT,
        model_class: model.model_class().to_string(),
        text_chars: text.chars().count(),
        elapsed,
        sentiment,
    };
    tokio::spawn(async move { record_prediction(&sample) });

    Ok(Json(PredictionResponse { prediction: sentiment }))
}

/// `POST /api/v1/inference/batch_predict` with a JSON array of texts
pub async fn batch_predict(
    State(state): State<AppState>,
    Json(texts): Json<Vec<String>>,
) -> Result<Json<Vec<Sentiment>>, ApiError> {
    let model = state.manager.get_default_model().map_err(ApiError::inference)?;
    let model_class = model.model_class().to_string();

    // Runs on the blocking pool
    let (texts, result, elapsed) = tokio::task::spawn_blocking(move || {
        let start = Instant::now();
        let result = model.batch_predict(&texts);
        (texts, result, start.elapsed())
    })
    .await
    .map_err(|e| ApiError::inference(Error::Inference(format!("Batch prediction task failed: {}", e))))?;

    let sentiments = result.map_err(ApiError::inference)?;
    debug!("Predicted {} texts in {:?}", sentiments.len(), elapsed);

    let sample = BatchSample {
        endpoint: BATCH_PREDICT_ENDPOINT,
        model_class,
        text_chars: texts.iter().map(|text| text.chars().count()).collect(),
        elapsed,
        sentiments: sentiments.clone(),
    };
    tokio::spawn(async move { record_batch(&sample) });

    Ok(Json(sentiments))
}
