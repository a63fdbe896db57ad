//! Model inference for OpinionLens
//!
//! This crate provides the serving-time half of the sentiment pipeline:
//! text cleaning, the TF-IDF vectorizer, linear classifiers and the
//! [`SentimentModel`] trait the rest of the workspace predicts through.

pub mod classifier;
pub mod engine;
pub mod text;
pub mod vectorizer;

// Re-export commonly used types
pub use classifier::{ClassifierKind, LinearClassifier};
pub use engine::{SentimentModel, TextClassifier, MODEL_FILE};
pub use text::{clean_text, preprocess, tokenize};
pub use vectorizer::{SharedVectorizer, SparseVector, TfidfVectorizer};
