//! Linear classifiers
//!
//! Logistic regression and linear SVC share the same decision function,
//! `w . x + b`, and differ only in how they were trained.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use common::error::{Error, Result};

use crate::vectorizer::SparseVector;

/// Estimator family the weights come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifierKind {
    LogisticRegression,
    #[serde(rename = "LinearSVC")]
    LinearSvc,
}

impl ClassifierKind {
    /// Class name as reported in metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierKind::LogisticRegression => "LogisticRegression",
            ClassifierKind::LinearSvc => "LinearSVC",
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary linear classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearClassifier {
    /// Estimator family
    pub kind: ClassifierKind,

    /// One weight per vectorizer feature
    pub coef: Vec<f64>,

    /// Bias term
    pub intercept: f64,

    /// Labels for a negative and a positive decision
    #[serde(default = "default_classes")]
    pub classes: [i64; 2],
}

fn default_classes() -> [i64; 2] {
    [0, 1]
}

impl LinearClassifier {
    /// Signed distance to the separating hyperplane
    pub fn decision(&self, x: &SparseVector) -> f64 {
        x.iter()
            .filter_map(|(index, value)| self.coef.get(*index).map(|w| w * value))
            .sum::<f64>()
            + self.intercept
    }

    /// Predicts the class label
    pub fn predict(&self, x: &SparseVector) -> i64 {
        if self.decision(x) > 0.0 {
            self.classes[1]
        } else {
            self.classes[0]
        }
    }

    /// Probability of the second class; only logistic regression has one
    pub fn predict_proba(&self, x: &SparseVector) -> Option<f64> {
        match self.kind {
            ClassifierKind::LogisticRegression => Some(1.0 / (1.0 + (-self.decision(x)).exp())),
            ClassifierKind::LinearSvc => None,
        }
    }

    /// Number of features the weights expect
    pub fn n_features(&self) -> usize {
        self.coef.len()
    }

    /// Loads a classifier saved as JSON
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let classifier: Self = serde_json::from_str(&json)?;

        if classifier.coef.iter().any(|w| !w.is_finite()) || !classifier.intercept.is_finite() {
            return Err(Error::InvalidArgument(format!("Classifier {:?} has non-finite weights", path)));
        }

        Ok(classifier)
    }

    /// Saves the classifier as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier(kind: ClassifierKind) -> LinearClassifier {
        LinearClassifier {
            kind,
            coef: vec![2.0, -3.0],
            intercept: 0.5,
            classes: [0, 1],
        }
    }

    #[test]
    fn test_decision_and_predict() {
        let clf = classifier(ClassifierKind::LinearSvc);
        assert!((clf.decision(&vec![(0, 1.0)]) - 2.5).abs() < 1e-12);
        assert_eq!(clf.predict(&vec![(0, 1.0)]), 1);
        assert_eq!(clf.predict(&vec![(1, 1.0)]), 0);
        assert_eq!(clf.predict(&Vec::new()), 1);
        assert_eq!(clf.predict_proba(&Vec::new()), None);
    }

    #[test]
    fn test_logistic_probability() {
        let clf = classifier(ClassifierKind::LogisticRegression);
        let p = clf.predict_proba(&vec![(1, 1.0)]).unwrap();
        assert!(p < 0.5);
    }

    #[test]
    fn test_json_format() {
        let json = r#"{"kind": "LinearSVC", "coef": [0.1, 0.2], "intercept": -0.3}"#;
        let clf: LinearClassifier = serde_json::from_str(json).unwrap();
        assert_eq!(clf.kind, ClassifierKind::LinearSvc);
        assert_eq!(clf.classes, [0, 1]);
        assert_eq!(clf.n_features(), 2);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let clf = classifier(ClassifierKind::LogisticRegression);
        clf.save(&path).unwrap();
        assert_eq!(LinearClassifier::load(&path).unwrap(), clf);
    }
}
