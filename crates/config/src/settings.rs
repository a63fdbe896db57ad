//! Typed configuration sections
//!
//! Every section implements `Default` with the values the service ships with;
//! the manager layers files and environment variables on top of them.

use std::path::PathBuf;
use serde::{Deserialize, Serialize};

use common::error::{Error, Result};

/// Complete application settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Model registry connection
    pub registry: RegistrySettings,

    /// HTTP API and local storage
    pub api: ApiSettings,

    /// Lifecycle manager behaviour
    pub manager: ManagerSettings,

    /// Logging output
    pub logging: LoggingSettings,
}

/// Model registry connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Base URL of the MLflow tracking server
    pub tracking_uri: String,

    /// Experiment whose registered models are listed by the registry search
    pub experiment: String,

    /// Total request timeout in seconds
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            tracking_uri: "http://localhost:5000".to_string(),
            experiment: "OpinionLens".to_string(),
            timeout_secs: 300,
            connect_timeout_secs: 30,
        }
    }
}

/// HTTP API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Root of the local artifact cache
    pub saved_model_path: PathBuf,

    /// Pre-fit TF-IDF vectorizer shared by every model
    pub vectorizer_path: PathBuf,

    /// Key expected in the `x-key` header of admin routes; admin routes are open when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_key: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            saved_model_path: PathBuf::from("./models"),
            vectorizer_path: PathBuf::from("./objects/vectorizer.json"),
            admin_key: None,
        }
    }
}

/// Lifecycle manager settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// Warm one cached model at startup and make it the default
    pub warm_on_boot: bool,

    /// Preferred model id for the boot default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            warm_on_boot: true,
            default_model: None,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is not set
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,

    /// Also write to this file (rotated daily)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
            json: false,
            file: None,
        }
    }
}

impl Settings {
    /// Normalizes values that have a canonical form
    pub fn normalize(&mut self) {
        let trimmed = self.registry.tracking_uri.trim_end_matches('/').to_string();
        self.registry.tracking_uri = trimmed;

        if let Some(key) = &self.api.admin_key {
            if key.trim().is_empty() {
                self.api.admin_key = None;
            }
        }
    }

    /// Validates the settings
    pub fn validate(&self) -> Result<()> {
        let uri = &self.registry.tracking_uri;
        if !(uri.starts_with("http://") || uri.starts_with("https://")) {
            return Err(Error::Config(format!(
                "registry.tracking_uri must be an http(s) URL, got {:?}",
                uri
            )));
        }

        if self.registry.timeout_secs == 0 || self.registry.connect_timeout_secs == 0 {
            return Err(Error::Config("registry timeouts must be greater than zero".to_string()));
        }

        if self.api.port == 0 {
            return Err(Error::Config("api.port must not be 0".to_string()));
        }

        if self.api.saved_model_path.as_os_str().is_empty() {
            return Err(Error::Config("api.saved_model_path must not be empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.api.port, 8000);
        assert!(settings.manager.warm_on_boot);
    }

    #[test]
    fn test_normalize_strips_trailing_slash() {
        let mut settings = Settings::default();
        settings.registry.tracking_uri = "https://mlflow.example.com//".to_string();
        settings.api.admin_key = Some("  ".to_string());
        settings.normalize();
        assert_eq!(settings.registry.tracking_uri, "https://mlflow.example.com");
        assert_eq!(settings.api.admin_key, None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.registry.tracking_uri = "ftp://registry".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.api.port = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.registry.timeout_secs = 0;
        assert!(settings.validate().is_err());
    }
}
