//! Sentiment models
//!
//! [`SentimentModel`] is what the lifecycle manager keeps warm and the API
//! predicts with. [`TextClassifier`] is the implementation for the models the
//! training pipeline registers: preprocessing, the shared TF-IDF vectorizer
//! and a linear classifier.

use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;

use common::error::{Error, Result};
use common::models::ModelId;
use common::types::Sentiment;

use crate::classifier::LinearClassifier;
use crate::text::preprocess;
use crate::vectorizer::{SharedVectorizer, TfidfVectorizer};

/// File holding the classifier weights inside an artifact directory
pub const MODEL_FILE: &str = "model.json";

/// A loaded model able to classify text
pub trait SentimentModel: Send + Sync {
    /// Identifier of the artifact the model was loaded from
    fn model_id(&self) -> &ModelId;

    /// Estimator class name, used as a metric label
    fn model_class(&self) -> &str;

    /// Classifies one text
    fn predict(&self, text: &str) -> Result<Sentiment>;

    /// Classifies many texts
    ///
    /// The result has the input's length and order and `result[i]` equals
    /// `predict(&texts[i])`. The first failure fails the whole batch.
    fn batch_predict(&self, texts: &[String]) -> Result<Vec<Sentiment>> {
        texts.iter().map(|text| self.predict(text)).collect()
    }
}

/// Text classifier over TF-IDF features
pub struct TextClassifier {
    /// Artifact identifier
    model_id: ModelId,

    /// Classifier weights
    classifier: LinearClassifier,

    /// Shared vectorizer
    vectorizer: Arc<TfidfVectorizer>,
}

impl TextClassifier {
    /// Creates a text classifier, checking the weights fit the vectorizer
    pub fn new(model_id: ModelId, classifier: LinearClassifier, vectorizer: Arc<TfidfVectorizer>) -> Result<Self> {
        if classifier.n_features() != vectorizer.n_features() {
            return Err(Error::Inference(format!(
                "Model {} expects {} features but the vectorizer produces {}",
                model_id,
                classifier.n_features(),
                vectorizer.n_features()
            )));
        }

        Ok(Self {
            model_id,
            classifier,
            vectorizer,
        })
    }

    /// Loads the classifier stored in an artifact directory
    pub fn load(dir: &Path, model_id: ModelId, vectorizer: &SharedVectorizer) -> Result<Self> {
        let model_file = dir.join(MODEL_FILE);
        if !model_file.is_file() {
            return Err(Error::Inference(format!("No {} in {:?}", MODEL_FILE, dir)));
        }

        let classifier = LinearClassifier::load(&model_file)?;
        debug!("Loaded {} weights for {} from {:?}", classifier.kind, model_id, model_file);

        Self::new(model_id, classifier, vectorizer.get()?)
    }

    /// Returns the classifier weights
    pub fn classifier(&self) -> &LinearClassifier {
        &self.classifier
    }
}

impl SentimentModel for TextClassifier {
    fn model_id(&self) -> &ModelId {
        &self.model_id
    }

    fn model_class(&self) -> &str {
        self.classifier.kind.as_str()
    }

    fn predict(&self, text: &str) -> Result<Sentiment> {
        let features = self.vectorizer.transform(&preprocess(text));
        Ok(Sentiment::from_label(self.classifier.predict(&features)))
    }

    fn batch_predict(&self, texts: &[String]) -> Result<Vec<Sentiment>> {
        texts.par_iter().map(|text| self.predict(text)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassifierKind;

    fn corpus() -> Vec<&'static str> {
        vec![
            "i love this movie",
            "great acting and a great story",
            "this product is awful",
            "i hate the ending",
            "the plot was fine",
        ]
    }

    fn model() -> TextClassifier {
        let vectorizer = TfidfVectorizer::fit(&corpus()).unwrap();
        let mut coef = vec![0.0; vectorizer.n_features()];
        for (term, weight) in [("love", 2.0), ("great", 2.0), ("awful", -2.0), ("hate", -2.0)] {
            coef[vectorizer.feature_index(term).unwrap()] = weight;
        }

        let classifier = LinearClassifier {
            kind: ClassifierKind::LogisticRegression,
            coef,
            intercept: -0.1,
            classes: [0, 1],
        };

        TextClassifier::new(ModelId::new("m-1").unwrap(), classifier, Arc::new(vectorizer)).unwrap()
    }

    #[test]
    fn test_predict_scenarios() {
        let model = model();
        assert_eq!(model.predict("I love this so much!").unwrap().label(), 1);
        assert_eq!(model.predict("This product is awful").unwrap().label(), 0);
        assert_eq!(model.predict("").unwrap(), Sentiment::Negative);
        assert_eq!(model.model_class(), "LogisticRegression");
    }

    #[test]
    fn test_batch_predict_preserves_order() {
        let model = model();
        let texts: Vec<String> = (0..64)
            .map(|i| if i % 3 == 0 { "awful, I hate it".to_string() } else { "<p>Great!</p> :)".to_string() })
            .collect();

        let batch = model.batch_predict(&texts).unwrap();
        assert_eq!(batch.len(), texts.len());
        for (text, sentiment) in texts.iter().zip(&batch) {
            assert_eq!(*sentiment, model.predict(text).unwrap());
        }

        assert!(model.batch_predict(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_feature_mismatch_is_rejected() {
        let vectorizer = Arc::new(TfidfVectorizer::fit(&corpus()).unwrap());
        let classifier = LinearClassifier {
            kind: ClassifierKind::LinearSvc,
            coef: vec![1.0],
            intercept: 0.0,
            classes: [0, 1],
        };
        assert!(TextClassifier::new(ModelId::new("m-1").unwrap(), classifier, vectorizer).is_err());
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let model = model();
        model.classifier().save(&dir.path().join(MODEL_FILE)).unwrap();

        let vectorizer = SharedVectorizer::from_vectorizer((*model.vectorizer).clone());
        let loaded = TextClassifier::load(dir.path(), ModelId::new("m-1").unwrap(), &vectorizer).unwrap();
        assert_eq!(loaded.predict("I love this so much!").unwrap(), Sentiment::Positive);

        let empty = tempfile::tempdir().unwrap();
        assert!(TextClassifier::load(empty.path(), ModelId::new("m-2").unwrap(), &vectorizer).is_err());
    }
}
