//! Model lifecycle management for OpinionLens
//!
//! This crate provides functionality for managing the lifecycle of sentiment
//! models: resolving references against the registry, caching artifacts on
//! disk, loading them into memory and tracking the default model.

pub mod downloader;
pub mod loader;
pub mod manager;
pub mod metadata;
pub mod registry;

// Re-export commonly used types
pub use downloader::ArtifactDownloader;
pub use loader::{ArtifactModelLoader, ModelLoader};
pub use manager::{FetchOptions, FetchOutcome, ModelManager};
pub use registry::{ArtifactStore, MlflowRegistry, RegistryEntry, ResolvedModel};
