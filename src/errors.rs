// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

use crate::analyze::AnalyzerError;

#[derive(Error, Debug)]
pub enum ReloadqError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// A raw filesystem event could not be mapped to a logical unit.
    #[error("cannot translate {path:?} to a unit: {reason}")]
    Translation { path: PathBuf, reason: String },

    #[error("analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    /// The reconciliation sink reported a failure.
    #[error("reconciliation failed: {0}")]
    Sink(String),

    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReloadqError {
    pub fn translation(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ReloadqError::Translation {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ReloadqError>;
