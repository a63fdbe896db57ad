//! TF-IDF vectorizer
//!
//! Term frequencies weighted by smoothed inverse document frequency and
//! l2-normalized, over tokens matching `\b\w\w+\b`. Case is preserved; the
//! cleaning step has already lowercased the text.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use common::error::{Error, Result};

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").unwrap());

/// Sparse feature vector as `(feature index, value)` pairs sorted by index
pub type SparseVector = Vec<(usize, f64)>;

/// Fitted TF-IDF vectorizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Term to feature index; indices follow the sorted term order
    vocabulary: BTreeMap<String, usize>,

    /// Inverse document frequency per feature index
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Builds a vectorizer from an explicit vocabulary and idf weights
    pub fn new(vocabulary: BTreeMap<String, usize>, idf: Vec<f64>) -> Result<Self> {
        let vectorizer = Self { vocabulary, idf };
        vectorizer.validate()?;
        Ok(vectorizer)
    }

    /// Fits the vocabulary and idf weights on a corpus
    pub fn fit<S: AsRef<str>>(corpus: &[S]) -> Result<Self> {
        if corpus.is_empty() {
            return Err(Error::InvalidArgument("Cannot fit a vectorizer on an empty corpus".to_string()));
        }

        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();

        for document in corpus {
            let terms: BTreeSet<&str> = analyze(document.as_ref()).collect();
            for term in terms {
                *document_frequency.entry(term.to_string()).or_insert(0) += 1;
            }
        }

        if document_frequency.is_empty() {
            return Err(Error::InvalidArgument(
                "Empty vocabulary; the documents only contain stop tokens".to_string(),
            ));
        }

        let n_documents = corpus.len() as f64;
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(document_frequency.len());

        for (index, (term, df)) in document_frequency.into_iter().enumerate() {
            idf.push(((1.0 + n_documents) / (1.0 + df as f64)).ln() + 1.0);
            vocabulary.insert(term, index);
        }

        debug!("Fitted vectorizer with {} features on {} documents", idf.len(), corpus.len());

        Ok(Self { vocabulary, idf })
    }

    /// Number of features
    pub fn n_features(&self) -> usize {
        self.idf.len()
    }

    /// Feature index of a term, if it is in the vocabulary
    pub fn feature_index(&self, term: &str) -> Option<usize> {
        self.vocabulary.get(term).copied()
    }

    /// Transforms one document; unknown terms are ignored
    pub fn transform(&self, document: &str) -> SparseVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();

        for term in analyze(document) {
            if let Some(&index) = self.vocabulary.get(term) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut vector: SparseVector = counts
            .into_iter()
            .map(|(index, count)| (index, count * self.idf[index]))
            .collect();
        vector.sort_unstable_by_key(|(index, _)| *index);

        let norm = vector.iter().map(|(_, value)| value * value).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, value) in vector.iter_mut() {
                *value /= norm;
            }
        }

        vector
    }

    /// Loads a vectorizer saved as JSON
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let vectorizer: Self = serde_json::from_str(&json)?;
        vectorizer.validate()?;

        info!("Loaded vectorizer with {} features from {:?}", vectorizer.n_features(), path);

        Ok(vectorizer)
    }

    /// Saves the vectorizer as JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.vocabulary.len() != self.idf.len() {
            return Err(Error::InvalidArgument(format!(
                "Vocabulary has {} terms but {} idf weights",
                self.vocabulary.len(),
                self.idf.len()
            )));
        }

        if let Some((term, index)) = self.vocabulary.iter().find(|(_, index)| **index >= self.idf.len()) {
            return Err(Error::InvalidArgument(format!(
                "Term {:?} has out of range feature index {}",
                term, index
            )));
        }

        Ok(())
    }
}

fn analyze(document: &str) -> impl Iterator<Item = &str> {
    TOKEN.find_iter(document).map(|m| m.as_str())
}

/// Process-wide read-only vectorizer
///
/// Loaded from disk on first use and shared by every model afterwards.
#[derive(Debug)]
pub struct SharedVectorizer {
    /// File the vectorizer is loaded from
    path: PathBuf,

    /// Loaded vectorizer
    cell: OnceCell<Arc<TfidfVectorizer>>,
}

impl SharedVectorizer {
    /// Creates a lazily loaded vectorizer
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cell: OnceCell::new(),
        }
    }

    /// Wraps an already loaded vectorizer
    pub fn from_vectorizer(vectorizer: TfidfVectorizer) -> Self {
        Self {
            path: PathBuf::new(),
            cell: OnceCell::with_value(Arc::new(vectorizer)),
        }
    }

    /// Returns the file the vectorizer is loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the vectorizer, loading it on first use
    pub fn get(&self) -> Result<Arc<TfidfVectorizer>> {
        self.cell
            .get_or_try_init(|| {
                if !self.path.exists() {
                    return Err(Error::Config(format!("Vectorizer file {:?} doesn't exist", self.path)));
                }
                TfidfVectorizer::load(&self.path).map(Arc::new)
            })
            .map(Arc::clone)
    }

    /// Loads the vectorizer now so a missing file fails startup
    pub fn ensure_available(&self) -> Result<()> {
        self.get().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<&'static str> {
        vec!["the movie was great", "the movie was awful", "great great acting"]
    }

    #[test]
    fn test_fit_builds_sorted_vocabulary() {
        let vectorizer = TfidfVectorizer::fit(&corpus()).unwrap();
        assert_eq!(vectorizer.n_features(), 6);
        assert_eq!(vectorizer.feature_index("acting"), Some(0));
        assert_eq!(vectorizer.feature_index("was"), Some(5));
        assert_eq!(vectorizer.feature_index("a"), None);
    }

    #[test]
    fn test_idf_is_smoothed() {
        let vectorizer = TfidfVectorizer::fit(&corpus()).unwrap();
        let great = vectorizer.feature_index("great").unwrap();
        let acting = vectorizer.feature_index("acting").unwrap();
        assert!((vectorizer.idf[great] - ((4.0f64 / 3.0).ln() + 1.0)).abs() < 1e-12);
        assert!((vectorizer.idf[acting] - (2.0f64.ln() + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_transform_is_l2_normalized() {
        let vectorizer = TfidfVectorizer::fit(&corpus()).unwrap();
        let vector = vectorizer.transform("great movie, unseen words");

        assert_eq!(vector.len(), 2);
        assert!(vector.windows(2).all(|w| w[0].0 < w[1].0));
        let norm: f64 = vector.iter().map(|(_, v)| v * v).sum();
        assert!((norm - 1.0).abs() < 1e-12);

        assert!(vectorizer.transform("nothing known").is_empty());
    }

    #[test]
    fn test_fit_rejects_empty_input() {
        let empty: Vec<&str> = Vec::new();
        assert!(TfidfVectorizer::fit(&empty).is_err());
        assert!(TfidfVectorizer::fit(&["a b c"][..]).is_err());
    }

    #[test]
    fn test_new_validates_shape() {
        let mut vocabulary = BTreeMap::new();
        vocabulary.insert("good".to_string(), 1);
        assert!(TfidfVectorizer::new(vocabulary.clone(), vec![1.0]).is_err());
        assert!(TfidfVectorizer::new(vocabulary, vec![1.0, 1.0]).is_err());
    }

    #[test]
    fn test_shared_vectorizer_loads_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects").join("vectorizer.json");
        TfidfVectorizer::fit(&corpus()).unwrap().save(&path).unwrap();

        let shared = SharedVectorizer::new(&path);
        shared.ensure_available().unwrap();
        std::fs::remove_file(&path).unwrap();

        let first = shared.get().unwrap();
        let second = shared.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_shared_vectorizer_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedVectorizer::new(dir.path().join("missing.json"));
        assert!(shared.ensure_available().is_err());
    }
}
