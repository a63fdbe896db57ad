//! Error types for the common crate
//!
//! This module defines the error taxonomy shared by every OpinionLens crate.
//! Each variant carries a free-form detail string; [`Error::kind`] exposes the
//! variant as a plain tag so the serving boundary can translate it without
//! caring about the payload.

use std::fmt;
use serde::Serialize;
use thiserror::Error;

/// Result type for OpinionLens operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for OpinionLens operations
#[derive(Error, Debug)]
pub enum Error {
    /// The external model registry could not resolve or transfer an artifact
    #[error("Model registry error: {0}")]
    Registry(String),

    /// The requested model has no state in this process
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// The lifecycle manager's own state machine refused or could not complete a transition
    #[error("Operational error: {0}")]
    Operational(String),

    /// Invalid argument error
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Inference error
    #[error("Inference error: {0}")]
    Inference(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Tag identifying the kind of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    Registry,
    ModelNotAvailable,
    Operational,
    InvalidArgument,
    Config,
    Inference,
    Io,
    Serialization,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Registry => "RegistryError",
            ErrorKind::ModelNotAvailable => "ModelNotAvailableError",
            ErrorKind::Operational => "OperationalError",
            ErrorKind::InvalidArgument => "InvalidArgumentError",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Inference => "InferenceError",
            ErrorKind::Io => "IoError",
            ErrorKind::Serialization => "SerializationError",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Returns the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Registry(_) => ErrorKind::Registry,
            Error::ModelNotAvailable(_) => ErrorKind::ModelNotAvailable,
            Error::Operational(_) => ErrorKind::Operational,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Config(_) => ErrorKind::Config,
            Error::Inference(_) => ErrorKind::Inference,
            Error::Io(_) => ErrorKind::Io,
            Error::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Returns the detail message without the kind prefix
    pub fn detail(&self) -> String {
        match self {
            Error::Registry(msg)
            | Error::ModelNotAvailable(msg)
            | Error::Operational(msg)
            | Error::InvalidArgument(msg)
            | Error::Config(msg)
            | Error::Inference(msg) => msg.clone(),
            Error::Io(e) => e.to_string(),
            Error::Serialization(e) => e.to_string(),
        }
    }

    /// Returns true if the error is a model-not-available error
    pub fn is_not_available(&self) -> bool {
        matches!(self, Error::ModelNotAvailable(_))
    }

    /// Returns true if the error is an operational error
    pub fn is_operational(&self) -> bool {
        matches!(self, Error::Operational(_))
    }

    /// Returns true if the error is a registry error
    pub fn is_registry(&self) -> bool {
        matches!(self, Error::Registry(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_detail() {
        let err = Error::ModelNotAvailable("No default model set.".to_string());
        assert_eq!(err.kind(), ErrorKind::ModelNotAvailable);
        assert_eq!(err.detail(), "No default model set.");
        assert!(err.is_not_available());
        assert!(!err.is_operational());

        let err = Error::Operational("Model 'm-1' is cold".to_string());
        assert_eq!(err.kind().to_string(), "OperationalError");
        assert_eq!(err.to_string(), "Operational error: Model 'm-1' is cold");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.detail(), "gone");
    }
}
