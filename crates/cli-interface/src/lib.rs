//! Command-line interface for OpinionLens
//!
//! This crate provides the argument parser of the `opinionlens` binary and
//! the plain-text renderers for its offline commands.

pub mod cli;
pub mod formatters;

// Re-export commonly used types
pub use cli::{CacheCommand, Cli, Command};
pub use formatters::{format_cache_table, format_predictions, CacheRow};
