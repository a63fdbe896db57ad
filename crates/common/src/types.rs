//! Common types for OpinionLens
//!
//! This module defines small value types used throughout the system.

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

/// Predicted sentiment of a text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    /// Label 0
    Negative,
    /// Label 1
    Positive,
}

impl Sentiment {
    /// Maps a classifier label onto a sentiment; anything other than 1 is negative
    pub fn from_label(label: i64) -> Self {
        if label == 1 {
            Sentiment::Positive
        } else {
            Sentiment::Negative
        }
    }

    /// Returns the integer label (0 = negative, 1 = positive)
    pub fn label(&self) -> i64 {
        match self {
            Sentiment::Negative => 0,
            Sentiment::Positive => 1,
        }
    }

    /// Returns the upper-case name used in API responses and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Negative => "NEGATIVE",
            Sentiment::Positive => "POSITIVE",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "POSITIVE" | "1" => Ok(Sentiment::Positive),
            "NEGATIVE" | "0" => Ok(Sentiment::Negative),
            _ => Err(format!("Unknown sentiment: {}", s)),
        }
    }
}
