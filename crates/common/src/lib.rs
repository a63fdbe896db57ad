//! Common utilities and types for OpinionLens
//!
//! This crate provides shared functionality used across the OpinionLens workspace,
//! including the error taxonomy, the model bookkeeping types and utility functions.

pub mod error;
pub mod models;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{Error, ErrorKind, Result};
pub use models::*;
pub use types::*;
