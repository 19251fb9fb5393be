//! Feature tables keyed by (geography unit, date).
//!
//! [`types`] holds the typed row and table, [`parser`] moves tables in and out of
//! CSV, and [`engineer`] builds a table from cleaned commute and weather
//! observations.

pub mod engineer;
pub mod parser;
pub mod types;

pub use types::{FeatureColumn, FeatureRow, FeatureTable};
