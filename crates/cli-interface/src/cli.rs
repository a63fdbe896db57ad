//! Argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Sentiment analysis serving with registry-backed models
#[derive(Debug, Parser)]
#[command(name = "opinionlens", version, about)]
pub struct Cli {
    /// Configuration file layered over config/default.toml and config/<ENV>.toml
    #[arg(short, long, global = true, env = "OPINIONLENS_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        /// Bind address, overrides api.host
        #[arg(long)]
        host: Option<String>,

        /// Bind port, overrides api.port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Inspect the local artifact cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// Classify texts with the model selected at boot
    Predict {
        /// Texts to classify
        #[arg(required = true, value_name = "TEXT")]
        text: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum CacheCommand {
    /// List cached artifacts
    List,
}
