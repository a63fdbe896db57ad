//! Performance metrics for OpinionLens
//!
//! This crate provides the Prometheus instruments recorded around model
//! inference and the exporter that renders them.

pub mod collector;
pub mod reporter;

// Re-export commonly used types
pub use collector::{record_batch, record_prediction, BatchSample, PredictionSample};
pub use reporter::install;
pub use metrics_exporter_prometheus::PrometheusHandle;
