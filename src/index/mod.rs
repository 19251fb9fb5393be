//! Composite index computation.
//!
//! A feature table is scored by four independent sub-score calculators, each scaled
//! against the current batch, and the results are combined with the configured
//! weights into the 0–100 SCHI. Scores from different runs are not comparable unless
//! fixed reference scaling is configured.

pub mod aggregate;
pub mod scale;
pub mod subscores;
pub mod types;
pub mod utility;

use tracing::{info, instrument};

use crate::config::Settings;
use crate::error::{InputError, Result};
use crate::features::types::FeatureTable;
use crate::index::aggregate::aggregate;
use crate::index::subscores::{access, crowding, reliability, weather_comfort};
use crate::index::types::SchiRun;

/// Scores every row of `table`. Output rows follow the input order one-for-one.
///
/// # Errors
///
/// [`InputError::Empty`] for an empty table, [`InputError::MissingColumn`] if any
/// column a calculator needs is structurally absent.
#[instrument(skip_all, fields(rows = table.len()))]
pub fn compute_schi(table: &FeatureTable, settings: &Settings) -> Result<SchiRun> {
    if table.is_empty() {
        return Err(InputError::Empty.into());
    }

    let rs = reliability(table, settings)?;
    let access = access(table, settings)?;
    let wc = weather_comfort(table, settings)?;
    let cx = crowding(table, settings)?;

    let rows = aggregate(
        table,
        &rs.values,
        &access.values,
        &wc.values,
        &cx.values,
        settings.weights(),
    );

    let warnings = [rs.warnings, access.warnings, wc.warnings, cx.warnings].concat();

    info!(rows = rows.len(), warnings = warnings.len(), "SCHI computed");
    Ok(SchiRun { rows, warnings })
}
