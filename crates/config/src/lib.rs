//! Configuration management for OpinionLens
//!
//! This crate provides the typed settings of the service and the manager
//! that layers defaults, TOML files and environment variables into them.

pub mod manager;
pub mod settings;

// Re-export commonly used types
pub use manager::{ConfigManager, ConfigOptions, Environment};
pub use settings::{ApiSettings, LoggingSettings, ManagerSettings, RegistrySettings, Settings};
