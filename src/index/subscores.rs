//! The four sub-score calculators.
//!
//! Every calculator follows the same convention: a raw burden is imputed, scaled onto
//! [0, 1] against the batch (or fixed reference bounds) and inverted, so a higher
//! burden always means a lower sub-score. Each returns one value per table row.

use tracing::warn;

use crate::config::Settings;
use crate::error::InputError;
use crate::features::types::{FeatureColumn, FeatureTable};
use crate::index::scale::scale_with;
use crate::index::types::{ImputationWarning, SubScore};
use crate::index::utility::median;

/// Share of rain in the weather comfort burden; temperature anomaly takes the rest.
pub const RAIN_SHARE: f64 = 0.6;
pub const TEMP_SHARE: f64 = 0.4;

/// How missing readings in a column are filled before scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Imputation {
    /// Median of the present readings in the column.
    Median,
    Zero,
}

/// Fills the missing readings of `column` and reports a warning when the missing
/// share is strictly above `threshold`.
///
/// A median-imputed column with no readings at all is filled with zeros.
pub fn impute(
    column: FeatureColumn,
    values: &[Option<f64>],
    rule: Imputation,
    threshold: f64,
) -> (Vec<f64>, Option<ImputationWarning>) {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let missing = values.len() - present.len();

    let fill = match rule {
        Imputation::Median => median(&present).unwrap_or(0.0),
        Imputation::Zero => 0.0,
    };
    let filled = values.iter().map(|v| v.unwrap_or(fill)).collect();

    let warning = if values.is_empty() {
        None
    } else {
        let fraction = missing as f64 / values.len() as f64;
        (fraction > threshold).then(|| {
            warn!(
                column = column.name(),
                missing,
                total = values.len(),
                fraction,
                "Imputed share exceeds threshold, sub-score may be unreliable"
            );
            ImputationWarning {
                column: column.name().to_string(),
                missing,
                total: values.len(),
                fraction,
            }
        })
    };

    (filled, warning)
}

/// Checks that every column in `required` is present before any work is done.
fn require(table: &FeatureTable, required: &[FeatureColumn]) -> Result<(), InputError> {
    for column in required {
        if !table.has_column(*column) {
            return Err(InputError::MissingColumn(column.name().to_string()));
        }
    }
    Ok(())
}

/// Imputes and scales one column, collecting any warning into `warnings`.
fn scaled_burden(
    table: &FeatureTable,
    column: FeatureColumn,
    rule: Imputation,
    settings: &Settings,
    warnings: &mut Vec<ImputationWarning>,
) -> Result<Vec<f64>, InputError> {
    let raw = table.column(column)?;
    let (filled, warning) = impute(column, &raw, rule, settings.missing_warn_threshold());
    warnings.extend(warning);
    Ok(scale_with(&filled, column.name(), settings.scaling()))
}

/// Reliability: `(1 - scale(avg_delay_min)) * (1 - scale(delay_std))`.
///
/// The product means both delay level and delay variability must be low for a high
/// score.
pub fn reliability(table: &FeatureTable, settings: &Settings) -> Result<SubScore, InputError> {
    require(table, &[FeatureColumn::AvgDelayMin, FeatureColumn::DelayStd])?;
    let mut warnings = Vec::new();

    let delay = scaled_burden(
        table,
        FeatureColumn::AvgDelayMin,
        Imputation::Median,
        settings,
        &mut warnings,
    )?;
    let spread = scaled_burden(
        table,
        FeatureColumn::DelayStd,
        Imputation::Zero,
        settings,
        &mut warnings,
    )?;

    let values = delay
        .iter()
        .zip(&spread)
        .map(|(d, s)| (1.0 - d) * (1.0 - s))
        .collect();

    Ok(SubScore { values, warnings })
}

/// Access: `1 - scale(headway_min)`.
pub fn access(table: &FeatureTable, settings: &Settings) -> Result<SubScore, InputError> {
    require(table, &[FeatureColumn::HeadwayMin])?;
    let mut warnings = Vec::new();

    let headway = scaled_burden(
        table,
        FeatureColumn::HeadwayMin,
        Imputation::Median,
        settings,
        &mut warnings,
    )?;

    Ok(SubScore {
        values: headway.iter().map(|h| 1.0 - h).collect(),
        warnings,
    })
}

/// Weather comfort: `1 - (0.6 * scale(rain_mm) + 0.4 * scale(|temp_anom|))`.
pub fn weather_comfort(table: &FeatureTable, settings: &Settings) -> Result<SubScore, InputError> {
    require(table, &[FeatureColumn::RainMm, FeatureColumn::TempAnom])?;
    let mut warnings = Vec::new();

    let rain = scaled_burden(
        table,
        FeatureColumn::RainMm,
        Imputation::Zero,
        settings,
        &mut warnings,
    )?;

    let anomaly = table.column(FeatureColumn::TempAnom)?;
    let (filled, warning) = impute(
        FeatureColumn::TempAnom,
        &anomaly,
        Imputation::Zero,
        settings.missing_warn_threshold(),
    );
    warnings.extend(warning);
    let magnitude: Vec<f64> = filled.iter().map(|t| t.abs()).collect();
    let temp = scale_with(&magnitude, "abs_temp_anom", settings.scaling());

    let values = rain
        .iter()
        .zip(&temp)
        .map(|(r, t)| 1.0 - (RAIN_SHARE * r + TEMP_SHARE * t))
        .collect();

    Ok(SubScore { values, warnings })
}

/// Crowding/experience: `1 - scale(crowd_proxy)`.
pub fn crowding(table: &FeatureTable, settings: &Settings) -> Result<SubScore, InputError> {
    require(table, &[FeatureColumn::CrowdProxy])?;
    let mut warnings = Vec::new();

    let crowd = scaled_burden(
        table,
        FeatureColumn::CrowdProxy,
        Imputation::Median,
        settings,
        &mut warnings,
    )?;

    Ok(SubScore {
        values: crowd.iter().map(|c| 1.0 - c).collect(),
        warnings,
    })
}
