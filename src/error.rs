//! Error types for the SCHI pipeline.
//!
//! [`ConfigError`] is raised while building [`crate::config::Settings`] and is fatal at
//! startup. [`InputError`] is raised when a feature table cannot be scored. Both are
//! wrapped by [`SchiError`], which also carries the I/O and codec failures of the
//! CSV/JSON layer.

use thiserror::Error;

/// Invalid configuration. Never silently corrected.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("SCHI weights must sum to 1.0 (got {sum})")]
    WeightSum { sum: f64 },

    #[error("SCHI weight {name} must be a finite non-negative number (got {value})")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("expected 4 comma-separated weights in {key}, got {count}")]
    WeightCount { key: &'static str, count: usize },

    #[error("could not parse {key}='{value}': {reason}")]
    Parse {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("reference bounds for '{column}' have max < min ({min} > {max})")]
    InvertedBounds { column: String, min: f64, max: f64 },

    #[error("{0} must be set when SCHI_SCALING=reference")]
    MissingReferenceBounds(&'static str),

    #[error("could not load reference bounds from '{path}': {reason}")]
    ReferenceBoundsFile { path: String, reason: String },
}

/// A feature table that cannot be scored.
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("required column '{0}' is absent from the feature table")]
    MissingColumn(String),

    #[error("duplicate key ({geography_unit_id}, {date})")]
    DuplicateKey {
        geography_unit_id: String,
        date: String,
    },

    #[error("invalid value for '{column}' at row {row}: {value}")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    #[error("feature table is empty")]
    Empty,
}

/// Top-level error returned by library operations.
#[derive(Debug, Error)]
pub enum SchiError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SchiError>;
