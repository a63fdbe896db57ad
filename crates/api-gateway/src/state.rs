//! Shared handler state

use std::sync::Arc;

use serde::Serialize;

use config::Settings;
use model_manager::ModelManager;
use performance_monitor::PrometheusHandle;

/// Static description served on `/api/v1/about`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppInfo {
    pub title: String,
    pub summary: String,
    pub version: String,
    pub license: String,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            title: "OpinionLens".to_string(),
            summary: "Sentiment analysis serving with registry-backed models.".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            license: "Apache-2.0".to_string(),
        }
    }
}

/// State cloned into every handler
#[derive(Clone)]
pub struct AppState {
    /// Model lifecycle manager
    pub manager: Arc<ModelManager>,

    /// Renders the Prometheus text exposition
    pub metrics: PrometheusHandle,

    /// Expected `x-key` value; admin routes are open when unset
    pub admin_key: Option<Arc<str>>,

    /// Experiment whose registered models the registry listing shows
    pub experiment: Arc<str>,

    pub info: Arc<AppInfo>,
}

impl AppState {
    pub fn new(manager: Arc<ModelManager>, metrics: PrometheusHandle, settings: &Settings) -> Self {
        Self {
            manager,
            metrics,
            admin_key: settings.api.admin_key.as_deref().map(Arc::from),
            experiment: Arc::from(settings.registry.experiment.as_str()),
            info: Arc::new(AppInfo::default()),
        }
    }
}
