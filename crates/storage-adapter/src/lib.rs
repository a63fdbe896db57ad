//! Persistent storage for OpinionLens
//!
//! This crate manages the local artifact cache: one directory per model
//! identifier, with crash-safe staging and removal.

pub mod cache;

// Re-export commonly used types
pub use cache::{ArtifactCache, CachedArtifact, RECORD_FILE};
