//! Prometheus exporter
//!
//! The recorder is process-global; [`install`] installs it on first call and
//! hands out the same handle afterwards.

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

use common::error::{Error, Result};

use crate::collector::{
    describe, BATCH_INFERENCE_TIME_PER_ITEM_SECONDS, BATCH_SIZE_BUCKETS, BATCH_SIZE_TEXT, INPUT_TEXT_LENGTH_CHARS,
    LATENCY_BUCKETS, MODEL_INFERENCE_TIME_SECONDS, TEXT_LENGTH_BUCKETS,
};

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Installs the Prometheus recorder once and returns its handle
pub fn install() -> Result<PrometheusHandle> {
    HANDLE
        .get_or_try_init(|| {
            let handle = PrometheusBuilder::new()
                .set_buckets_for_metric(Matcher::Full(MODEL_INFERENCE_TIME_SECONDS.to_string()), LATENCY_BUCKETS)
                .and_then(|b| {
                    b.set_buckets_for_metric(
                        Matcher::Full(BATCH_INFERENCE_TIME_PER_ITEM_SECONDS.to_string()),
                        LATENCY_BUCKETS,
                    )
                })
                .and_then(|b| b.set_buckets_for_metric(Matcher::Full(INPUT_TEXT_LENGTH_CHARS.to_string()), TEXT_LENGTH_BUCKETS))
                .and_then(|b| b.set_buckets_for_metric(Matcher::Full(BATCH_SIZE_TEXT.to_string()), BATCH_SIZE_BUCKETS))
                .and_then(|b| b.install_recorder())
                .map_err(|e| Error::Config(format!("Failed to install metrics recorder: {}", e)))?;

            describe();
            info!("Prometheus metrics recorder installed");

            Ok(handle)
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{record_batch, record_prediction, BatchSample, PredictionSample};
    use common::types::Sentiment;
    use std::time::Duration;

    #[test]
    fn test_install_is_idempotent() {
        let first = install().unwrap();
        let second = install().unwrap();
        record_prediction(&PredictionSample {
            endpoint: "/predict",
            model_class: "LinearSVC".to_string(),
            text_chars: 42,
            elapsed: Duration::from_millis(3),
            sentiment: Sentiment::Positive,
        });
        assert!(first.render().contains("predicted_sentiment_total"));
        assert!(second.render().contains("model_class=\"LinearSVC\""));
    }

    #[test]
    fn test_rendered_instruments() {
        let handle = install().unwrap();

        record_prediction(&PredictionSample {
            endpoint: "/predict",
            model_class: "LogisticRegression".to_string(),
            text_chars: 120,
            elapsed: Duration::from_millis(30),
            sentiment: Sentiment::Positive,
        });
        record_batch(&BatchSample {
            endpoint: "/batch_predict",
            model_class: "LogisticRegression".to_string(),
            text_chars: vec![5, 700, 3000],
            elapsed: Duration::from_millis(90),
            sentiments: vec![Sentiment::Negative, Sentiment::Positive, Sentiment::Negative],
        });

        let text = handle.render();
        assert!(text.contains("model_inference_time_seconds_bucket"));
        assert!(text.contains("le=\"0.05\""));
        assert!(text.contains("input_text_length_chars_bucket"));
        assert!(text.contains("le=\"2000\""));
        assert!(text.contains("batch_size_text_bucket"));
        assert!(text.contains("batch_inference_time_per_item_seconds_bucket"));
        assert!(text.contains("predicted_sentiment_total{label=\"NEGATIVE\"}"));
        assert!(text.contains("endpoint=\"/batch_predict\""));
        assert!(text.contains("model_class=\"LogisticRegression\""));
    }
}
