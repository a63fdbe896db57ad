//! Model loader
//!
//! Turns an artifact directory into a ready-to-serve [`SentimentModel`].
//! Loading is blocking work; the lifecycle manager runs it on the blocking
//! thread pool.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use common::error::Result;
use common::models::ModelId;
use inference_engine::{SentimentModel, SharedVectorizer, TextClassifier};

/// Factory producing loaded models from artifact directories
pub trait ModelLoader: Send + Sync {
    /// Loads the artifact at `path`
    fn load(&self, path: &Path, model_id: &ModelId) -> Result<Arc<dyn SentimentModel>>;
}

/// Loads [`TextClassifier`] artifacts (`model.json`) against the shared vectorizer
pub struct ArtifactModelLoader {
    /// Vectorizer shared by every loaded model
    vectorizer: Arc<SharedVectorizer>,
}

impl ArtifactModelLoader {
    /// Creates a new model loader
    pub fn new(vectorizer: Arc<SharedVectorizer>) -> Self {
        Self { vectorizer }
    }
}

impl ModelLoader for ArtifactModelLoader {
    fn load(&self, path: &Path, model_id: &ModelId) -> Result<Arc<dyn SentimentModel>> {
        let started = Instant::now();

        let model = TextClassifier::load(path, model_id.clone(), &self.vectorizer)?;

        info!(
            "Loaded {} model {} from {:?} in {:.2?}",
            model.model_class(),
            model_id,
            path,
            started.elapsed()
        );

        Ok(Arc::new(model))
    }
}
