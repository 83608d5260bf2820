//! # Error Module
//!
//! Errors that can escape the tuner core. Only failures that must stop the
//! program before the cycle loop starts are represented here. Short serial
//! reads and degenerate math (log of zero, cents of a zero frequency) are
//! absorbed inside the pipeline and never surface as errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while setting up or driving the tuner.
#[derive(Error, Debug)]
pub enum TunerError {
    /// The sample source could not be opened at startup. Fatal, no retry.
    #[error("sample source unavailable at {path}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration or tuning table, rejected at load time.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl TunerError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        TunerError::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, TunerError>;
