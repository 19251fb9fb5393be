//! Data types produced by the scoring pipeline.

use chrono::NaiveDate;
use serde::Serialize;

/// Sub-scores and composite index for one (geography unit, date), all in [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchiRow {
    pub geography_unit_id: String,
    pub date: NaiveDate,
    #[serde(rename = "RS")]
    pub rs: f64,
    #[serde(rename = "AS")]
    pub access: f64,
    #[serde(rename = "WC")]
    pub wc: f64,
    #[serde(rename = "CX")]
    pub cx: f64,
    #[serde(rename = "SCHI")]
    pub schi: f64,
}

/// Raised when a column needed too much imputation to be trusted. Never fatal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImputationWarning {
    pub column: String,
    pub missing: usize,
    pub total: usize,
    pub fraction: f64,
}

/// One sub-score column in [0, 1] with the warnings raised while imputing its inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct SubScore {
    pub values: Vec<f64>,
    pub warnings: Vec<ImputationWarning>,
}

/// Output of a full scoring run.
#[derive(Debug, Clone, PartialEq)]
pub struct SchiRun {
    pub rows: Vec<SchiRow>,
    pub warnings: Vec<ImputationWarning>,
}

/// Headline statistics for a run, logged by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub rows: usize,
    pub min_schi: f64,
    pub mean_schi: f64,
    pub max_schi: f64,
    pub warnings: usize,
}
