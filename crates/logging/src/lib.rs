//! Logging for OpinionLens
//!
//! Installs the global `tracing` subscriber: human-readable or JSON lines on
//! stdout, optionally mirrored to a daily-rotated file.

use std::path::Path;

pub use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use common::error::{Error, Result};
use config::LoggingSettings;

/// Builds the filter; `RUST_LOG` wins over the configured level
pub fn env_filter(default_level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_level)
            .map_err(|e| Error::Config(format!("Invalid log level {:?}: {}", default_level, e))),
    }
}

/// Initializes logging
///
/// The returned guard flushes the file writer when dropped and must be kept
/// alive for the lifetime of the process. Calling this twice is harmless:
/// the second call leaves the existing subscriber in place.
pub fn init(settings: &LoggingSettings) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(&settings.level)?;

    let stdout_layer = if settings.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let (file_layer, guard) = match &settings.file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init();

    if result.is_err() {
        // Already initialized, e.g. by a test harness
        tracing::debug!("Global subscriber already set, keeping it");
    }

    Ok(guard)
}

fn file_writer(path: &Path) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Config(format!("Log file path {:?} has no file name", path)))?;

    std::fs::create_dir_all(directory)?;

    let appender = tracing_appender::rolling::daily(directory, file_name);
    Ok(tracing_appender::non_blocking(appender))
}
