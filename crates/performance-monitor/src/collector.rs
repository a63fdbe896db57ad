//! Inference instruments
//!
//! Names, labels and buckets match the dashboards built for the service:
//!
//! | metric | type | labels |
//! |---|---|---|
//! | `model_inference_time_seconds` | histogram | `endpoint`, `model_class` |
//! | `input_text_length_chars` | histogram | `endpoint` |
//! | `batch_size_text` | histogram | `endpoint` |
//! | `batch_inference_time_per_item_seconds` | histogram | `endpoint`, `model_class` |
//! | `predicted_sentiment_total` | counter | `label` |

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

use common::types::Sentiment;

pub const MODEL_INFERENCE_TIME_SECONDS: &str = "model_inference_time_seconds";
pub const INPUT_TEXT_LENGTH_CHARS: &str = "input_text_length_chars";
pub const BATCH_SIZE_TEXT: &str = "batch_size_text";
pub const BATCH_INFERENCE_TIME_PER_ITEM_SECONDS: &str = "batch_inference_time_per_item_seconds";
pub const PREDICTED_SENTIMENT_TOTAL: &str = "predicted_sentiment_total";

pub const LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.2, 0.5, 1.0];
pub const TEXT_LENGTH_BUCKETS: &[f64] = &[10.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0];
pub const BATCH_SIZE_BUCKETS: &[f64] = &[2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0];

/// One single-text prediction
#[derive(Debug, Clone)]
pub struct PredictionSample {
    /// Route the prediction was served on
    pub endpoint: &'static str,

    /// Estimator class of the model
    pub model_class: String,

    /// Input length in characters
    pub text_chars: usize,

    /// Time spent in the model
    pub elapsed: Duration,

    /// Predicted sentiment
    pub sentiment: Sentiment,
}

/// One batch prediction
#[derive(Debug, Clone)]
pub struct BatchSample {
    /// Route the prediction was served on
    pub endpoint: &'static str,

    /// Estimator class of the model
    pub model_class: String,

    /// Length in characters of every input
    pub text_chars: Vec<usize>,

    /// Time spent in the model for the whole batch
    pub elapsed: Duration,

    /// Predicted sentiments
    pub sentiments: Vec<Sentiment>,
}

/// Registers descriptions for every instrument
pub fn describe() {
    describe_histogram!(MODEL_INFERENCE_TIME_SECONDS, Unit::Seconds, "Model inference duration");
    describe_histogram!(INPUT_TEXT_LENGTH_CHARS, "Input text length in characters");
    describe_histogram!(BATCH_SIZE_TEXT, Unit::Count, "Number of texts in batch");
    describe_histogram!(
        BATCH_INFERENCE_TIME_PER_ITEM_SECONDS,
        Unit::Seconds,
        "Inference time per item in batch"
    );
    describe_counter!(PREDICTED_SENTIMENT_TOTAL, "Predicted sentiment classes");
}

/// Records a single-text prediction
pub fn record_prediction(sample: &PredictionSample) {
    histogram!(INPUT_TEXT_LENGTH_CHARS, sample.text_chars as f64, "endpoint" => sample.endpoint);
    histogram!(
        MODEL_INFERENCE_TIME_SECONDS,
        sample.elapsed.as_secs_f64(),
        "endpoint" => sample.endpoint,
        "model_class" => sample.model_class.clone()
    );
    counter!(PREDICTED_SENTIMENT_TOTAL, 1, "label" => sample.sentiment.as_str());
}

/// Records a batch prediction
pub fn record_batch(sample: &BatchSample) {
    let elapsed = sample.elapsed.as_secs_f64();

    histogram!(
        MODEL_INFERENCE_TIME_SECONDS,
        elapsed,
        "endpoint" => sample.endpoint,
        "model_class" => sample.model_class.clone()
    );

    if !sample.text_chars.is_empty() {
        histogram!(
            BATCH_INFERENCE_TIME_PER_ITEM_SECONDS,
            elapsed / sample.text_chars.len() as f64,
            "endpoint" => sample.endpoint,
            "model_class" => sample.model_class.clone()
        );
    }

    histogram!(BATCH_SIZE_TEXT, sample.text_chars.len() as f64, "endpoint" => sample.endpoint);

    for chars in &sample.text_chars {
        histogram!(INPUT_TEXT_LENGTH_CHARS, *chars as f64, "endpoint" => sample.endpoint);
    }

    for sentiment in &sample.sentiments {
        counter!(PREDICTED_SENTIMENT_TOTAL, 1, "label" => sentiment.as_str());
    }
}
