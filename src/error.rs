//! Error types for tracking, targeting configuration and alert delivery.

use std::path::PathBuf;

use thiserror::Error;

/// A detection that cannot be fed to the associator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    #[error("bounding box has non-finite coordinates")]
    NonFiniteBox,

    #[error("bounding box is degenerate: width {width}, height {height}")]
    DegenerateBox { width: f32, height: f32 },

    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f32),
}

/// Recoverable per-track failures. The affected track is dropped, the frame continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackingError {
    #[error("numerical failure on track {track_id}: {reason}")]
    NumericalFailure { track_id: u64, reason: String },
}

impl TrackingError {
    pub fn numerical<S: Into<String>>(track_id: u64, reason: S) -> Self {
        Self::NumericalFailure {
            track_id,
            reason: reason.into(),
        }
    }
}

/// Configuration problems. These are fatal: the pipeline refuses to start.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("cannot read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn invalid_value<S: Into<String>>(field: &'static str, reason: S) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Failures inside an alert delivery backend. Never reach the frame loop.
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("alert sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("alert serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
