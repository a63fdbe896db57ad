//! Configuration manager
//!
//! Builds the effective [`Settings`] from, in increasing precedence:
//! built-in defaults, the user config file, `config/default.toml`,
//! `config/<ENV>.toml`, an explicit file, and `OPINIONLENS__*` environment
//! variables.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use config_rs::{Config, Environment as EnvSource, File, FileFormat};
use tracing::debug;

use common::error::{Error, Result};

use crate::settings::Settings;

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "OPINIONLENS";

/// Separator for prefix and nested keys, e.g. `OPINIONLENS__API__PORT`
pub const ENV_SEPARATOR: &str = "__";

/// Deployment environment, selected by the `ENV` variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Stage,
    Prod,
}

impl Environment {
    /// Reads `ENV`; unknown or missing values fall back to `Local`
    pub fn from_env() -> Self {
        std::env::var("ENV")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(Environment::Local)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Environment::Local),
            "stage" | "staging" => Ok(Environment::Stage),
            "prod" | "production" => Ok(Environment::Prod),
            _ => Err(format!("Unknown environment: {}", s)),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Local => write!(f, "local"),
            Environment::Stage => write!(f, "stage"),
            Environment::Prod => write!(f, "prod"),
        }
    }
}

/// Where the manager looks for configuration
#[derive(Debug, Clone)]
pub struct ConfigOptions {
    /// Directory holding `default.toml` and `<env>.toml`
    pub config_dir: PathBuf,

    /// Explicit file, must exist when given
    pub file: Option<PathBuf>,

    /// Deployment environment
    pub environment: Environment,

    /// Environment variable prefix
    pub env_prefix: String,

    /// Whether to read the per-user config file
    pub user_config: bool,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("config"),
            file: None,
            environment: Environment::from_env(),
            env_prefix: ENV_PREFIX.to_string(),
            user_config: true,
        }
    }
}

/// Configuration manager
pub struct ConfigManager {
    /// Effective settings
    settings: Settings,

    /// Environment the settings were loaded for
    environment: Environment,
}

impl ConfigManager {
    /// Creates a configuration manager with the default search locations
    pub fn new(config_path: Option<PathBuf>) -> Result<Self> {
        Self::load(ConfigOptions {
            file: config_path,
            ..ConfigOptions::default()
        })
    }

    /// Creates a configuration manager from explicit options
    pub fn load(options: ConfigOptions) -> Result<Self> {
        let defaults = Config::try_from(&Settings::default()).map_err(config_error)?;

        let mut builder = Config::builder().add_source(defaults);

        if options.user_config {
            if let Some(user_file) = user_config_file() {
                builder = builder.add_source(File::from(user_file).format(FileFormat::Toml).required(false));
            }
        }

        builder = builder
            .add_source(file_source(&options.config_dir.join("default.toml"), false))
            .add_source(file_source(
                &options.config_dir.join(format!("{}.toml", options.environment)),
                false,
            ));

        if let Some(file) = &options.file {
            if !file.exists() {
                return Err(Error::Config(format!("Config file {:?} does not exist", file)));
            }
            builder = builder.add_source(file_source(file, true));
        }

        builder = builder.add_source(
            EnvSource::with_prefix(&options.env_prefix)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_error)?;
        let mut settings: Settings = config.try_deserialize().map_err(config_error)?;

        settings.normalize();
        settings.validate()?;

        debug!("Loaded {} configuration: {:?}", options.environment, settings);

        Ok(Self {
            settings,
            environment: options.environment,
        })
    }

    /// Wraps already-built settings, validating them
    pub fn from_settings(mut settings: Settings) -> Result<Self> {
        settings.normalize();
        settings.validate()?;

        Ok(Self {
            settings,
            environment: Environment::Local,
        })
    }

    /// Returns the effective settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the environment the settings were loaded for
    pub fn environment(&self) -> Environment {
        self.environment
    }
}

fn file_source(path: &Path, required: bool) -> File<config_rs::FileSourceFile, FileFormat> {
    File::from(path).format(FileFormat::Toml).required(required)
}

fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("opinionlens").join("config.toml"))
}

fn config_error(err: config_rs::ConfigError) -> Error {
    Error::Config(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn options(dir: &Path, prefix: &str) -> ConfigOptions {
        ConfigOptions {
            config_dir: dir.to_path_buf(),
            file: None,
            environment: Environment::Local,
            env_prefix: prefix.to_string(),
            user_config: false,
        }
    }

    #[test]
    fn test_defaults_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::load(options(dir.path(), "OLTEST_DEFAULTS")).unwrap();
        assert_eq!(manager.settings(), &Settings::default());
        assert_eq!(manager.environment(), Environment::Local);
    }

    #[test]
    fn test_file_layers() {
        let dir = tempfile::tempdir().unwrap();

        let mut default = std::fs::File::create(dir.path().join("default.toml")).unwrap();
        writeln!(default, "[api]\nport = 9000\n\n[manager]\nwarm_on_boot = false").unwrap();

        let mut local = std::fs::File::create(dir.path().join("local.toml")).unwrap();
        writeln!(local, "[api]\nport = 9100\n\n[registry]\ntracking_uri = \"http://mlflow:5000/\"").unwrap();

        let manager = ConfigManager::load(options(dir.path(), "OLTEST_FILES")).unwrap();
        let settings = manager.settings();
        assert_eq!(settings.api.port, 9100);
        assert!(!settings.manager.warm_on_boot);
        assert_eq!(settings.registry.tracking_uri, "http://mlflow:5000");
        assert_eq!(settings.api.host, "0.0.0.0");
    }

    #[test]
    fn test_env_overrides_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("default.toml"), "[api]\nport = 9000\n").unwrap();

        std::env::set_var("OLTEST_ENV__API__PORT", "9200");
        std::env::set_var("OLTEST_ENV__MANAGER__DEFAULT_MODEL", "m-abc");
        let manager = ConfigManager::load(options(dir.path(), "OLTEST_ENV")).unwrap();
        std::env::remove_var("OLTEST_ENV__API__PORT");
        std::env::remove_var("OLTEST_ENV__MANAGER__DEFAULT_MODEL");

        assert_eq!(manager.settings().api.port, 9200);
        assert_eq!(manager.settings().manager.default_model.as_deref(), Some("m-abc"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = options(dir.path(), "OLTEST_MISSING");
        opts.file = Some(dir.path().join("nope.toml"));
        let err = ConfigManager::load(opts).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("default.toml"), "[api]\nport = 0\n").unwrap();
        assert!(ConfigManager::load(options(dir.path(), "OLTEST_INVALID")).is_err());
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
        assert_eq!("stage".parse::<Environment>().unwrap(), Environment::Stage);
        assert!("qa".parse::<Environment>().is_err());
    }
}
