//! Main integration module for OpinionLens
//!
//! This module wires the workspace crates together: configuration, logging,
//! the model lifecycle manager, metrics and the HTTP API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use api_gateway::{AppState, RestApi};
use cli_interface::CacheRow;
use common::types::Sentiment;
use config::{ConfigManager, Settings};
use inference_engine::SharedVectorizer;
use logging::WorkerGuard;
use model_manager::{ArtifactModelLoader, MlflowRegistry, ModelManager};
use storage_adapter::ArtifactCache;

/// The OpinionLens application
pub struct OpinionLens {
    /// Configuration manager
    config_manager: Arc<ConfigManager>,

    /// Model lifecycle manager
    model_manager: Arc<ModelManager>,

    /// Keeps the file log writer flushing until the application is dropped
    _log_guard: Option<WorkerGuard>,
}

impl OpinionLens {
    /// Loads configuration, initializes logging and builds the application
    pub async fn new(config_path: Option<PathBuf>) -> Result<Self> {
        let config_manager = ConfigManager::new(config_path).context("Failed to load configuration")?;
        let log_guard = logging::init(&config_manager.settings().logging).context("Failed to initialize logging")?;

        Self::with_config(config_manager, log_guard).await
    }

    /// Builds the application from loaded configuration
    ///
    /// Fails when the vectorizer cannot be loaded; an empty model cache is fine.
    pub async fn with_config(config_manager: ConfigManager, log_guard: Option<WorkerGuard>) -> Result<Self> {
        let settings = config_manager.settings();
        info!("Initializing OpinionLens ({} environment)", config_manager.environment());

        let vectorizer = Arc::new(SharedVectorizer::new(settings.api.vectorizer_path.clone()));
        vectorizer
            .ensure_available()
            .with_context(|| format!("Vectorizer at {:?} is not usable", settings.api.vectorizer_path))?;

        let store = Arc::new(MlflowRegistry::new(&settings.registry)?);
        let cache = ArtifactCache::open(settings.api.saved_model_path.clone())?;
        let loader = Arc::new(ArtifactModelLoader::new(vectorizer));

        let model_manager = ModelManager::open(cache, store, loader, &settings.manager).await?;

        Ok(Self {
            config_manager: Arc::new(config_manager),
            model_manager: Arc::new(model_manager),
            _log_guard: log_guard,
        })
    }

    /// Serves the HTTP API until Ctrl+C
    ///
    /// `host` and `port` override the configured bind address.
    pub async fn serve(&self, host: Option<String>, port: Option<u16>) -> Result<()> {
        let settings = self.settings();

        let metrics = performance_monitor::install()?;
        let state = AppState::new(self.model_manager.clone(), metrics, settings);

        let host = host.unwrap_or_else(|| settings.api.host.clone());
        let port = port.unwrap_or(settings.api.port);

        let api = RestApi::bind(&host, port, api_gateway::router(state))
            .await
            .with_context(|| format!("Failed to bind {}:{}", host, port))?;

        api.serve(shutdown_signal()).await?;

        Ok(())
    }

    /// Classifies texts with the default model, selecting one first if none is set
    pub async fn predict(&self, texts: &[String]) -> Result<Vec<Sentiment>> {
        if self.model_manager.default_model_id().is_none() {
            let preferred = self.settings().manager.default_model.as_deref();
            self.model_manager.reconcile(preferred).await;
        }

        let model = self.model_manager.get_default_model()?;
        let texts = texts.to_vec();

        let sentiments = tokio::task::spawn_blocking(move || model.batch_predict(&texts))
            .await
            .context("Prediction task failed")??;

        Ok(sentiments)
    }

    /// Lists the artifact cache without building the application
    pub fn cache_rows(settings: &Settings) -> Result<Vec<CacheRow>> {
        let cache = ArtifactCache::open(settings.api.saved_model_path.clone())?;

        let mut rows = Vec::new();
        for artifact in cache.scan()? {
            let record = match cache.read_record(&artifact.model_id) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Unreadable record for {}: {}", artifact.model_id, e);
                    None
                }
            };
            rows.push(CacheRow { artifact, record });
        }

        Ok(rows)
    }

    /// Unloads every model; cached artifacts stay on disk
    pub fn shutdown(&self) {
        info!("Stopping OpinionLens");
        self.model_manager.shutdown();
        info!("OpinionLens stopped");
    }

    /// Gets the effective settings
    pub fn settings(&self) -> &Settings {
        self.config_manager.settings()
    }

    /// Gets the configuration manager
    pub fn config_manager(&self) -> Arc<ConfigManager> {
        self.config_manager.clone()
    }

    /// Gets the model manager
    pub fn model_manager(&self) -> Arc<ModelManager> {
        self.model_manager.clone()
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Cannot listen for Ctrl+C, serving until killed: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::ModelId;
    use inference_engine::{ClassifierKind, LinearClassifier, TfidfVectorizer, MODEL_FILE};
    use tempfile::TempDir;

    /// Writes a vectorizer and one cached model `m-1`, returning matching settings
    fn fixture(dir: &TempDir, warm_on_boot: bool) -> Settings {
        let vectorizer = TfidfVectorizer::fit(&[
            "i love this movie",
            "this product is awful",
            "i hate the ending",
        ][..])
        .unwrap();

        let mut coef = vec![0.0; vectorizer.n_features()];
        for (term, weight) in [("love", 1.5), ("awful", -1.5), ("hate", -1.5)] {
            coef[vectorizer.feature_index(term).unwrap()] = weight;
        }
        let classifier = LinearClassifier {
            kind: ClassifierKind::LogisticRegression,
            coef,
            intercept: 0.0,
            classes: [0, 1],
        };

        let vectorizer_path = dir.path().join("vectorizer.json");
        vectorizer.save(&vectorizer_path).unwrap();

        let models = dir.path().join("models");
        std::fs::create_dir_all(models.join("m-1")).unwrap();
        std::fs::write(models.join("m-1").join(MODEL_FILE), serde_json::to_string(&classifier).unwrap()).unwrap();

        let mut settings = Settings::default();
        settings.api.vectorizer_path = vectorizer_path;
        settings.api.saved_model_path = models;
        settings.manager.warm_on_boot = warm_on_boot;
        settings
    }

    #[tokio::test]
    async fn test_boot_selects_cached_model() {
        let dir = tempfile::tempdir().unwrap();
        let settings = fixture(&dir, true);

        let app = OpinionLens::with_config(ConfigManager::from_settings(settings).unwrap(), None)
            .await
            .unwrap();
        assert_eq!(app.model_manager().default_model_id(), Some(ModelId::new("m-1").unwrap()));

        let texts = vec!["I love this so much!".to_string(), "This product is awful".to_string()];
        let sentiments = app.predict(&texts).await.unwrap();
        assert_eq!(sentiments, vec![Sentiment::Positive, Sentiment::Negative]);

        app.shutdown();
        assert!(app.model_manager().default_model_id().is_none());
        assert!(dir.path().join("models").join("m-1").is_dir());
    }

    #[tokio::test]
    async fn test_predict_selects_model_when_boot_did_not() {
        let dir = tempfile::tempdir().unwrap();
        let settings = fixture(&dir, false);

        let app = OpinionLens::with_config(ConfigManager::from_settings(settings).unwrap(), None)
            .await
            .unwrap();
        assert!(app.model_manager().default_model_id().is_none());

        let sentiments = app.predict(&["i hate it".to_string()]).await.unwrap();
        assert_eq!(sentiments, vec![Sentiment::Negative]);
    }

    #[tokio::test]
    async fn test_missing_vectorizer_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = fixture(&dir, true);
        settings.api.vectorizer_path = dir.path().join("missing.json");

        let result = OpinionLens::with_config(ConfigManager::from_settings(settings).unwrap(), None).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_cache_rows() {
        let dir = tempfile::tempdir().unwrap();
        let settings = fixture(&dir, true);

        let rows = OpinionLens::cache_rows(&settings).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].artifact.model_id.as_str(), "m-1");
        assert!(rows[0].record.is_none());
    }
}
