use crate::config::Weights;
use crate::features::types::FeatureTable;
use crate::index::types::{RunSummary, SchiRow, SchiRun};
use crate::index::utility::mean;

/// Combines aligned sub-score columns (each in [0, 1]) into SCHI rows.
///
/// `SCHI = 100 * (W_RS*RS + W_AS*AS + W_WC*WC + W_CX*CX)`. Since [`Weights`] is a
/// convex combination the result lies in [0, 100]; every output is clamped so
/// floating-point drift can never leave that range.
pub fn aggregate(
    table: &FeatureTable,
    rs: &[f64],
    access: &[f64],
    wc: &[f64],
    cx: &[f64],
    weights: &Weights,
) -> Vec<SchiRow> {
    table
        .rows()
        .iter()
        .zip(rs)
        .zip(access)
        .zip(wc)
        .zip(cx)
        .map(|((((row, &rs), &access), &wc), &cx)| {
            let composite = weights.rs() * rs
                + weights.access() * access
                + weights.wc() * wc
                + weights.cx() * cx;

            SchiRow {
                geography_unit_id: row.geography_unit_id.clone(),
                date: row.date,
                rs: to_percent(rs),
                access: to_percent(access),
                wc: to_percent(wc),
                cx: to_percent(cx),
                schi: to_percent(composite),
            }
        })
        .collect()
}

fn to_percent(unit: f64) -> f64 {
    (100.0 * unit).clamp(0.0, 100.0)
}

impl SchiRun {
    pub fn summary(&self) -> RunSummary {
        let scores: Vec<f64> = self.rows.iter().map(|r| r.schi).collect();
        let min_schi = scores.iter().copied().fold(f64::INFINITY, f64::min);
        let max_schi = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        RunSummary {
            rows: scores.len(),
            min_schi: if scores.is_empty() { 0.0 } else { min_schi },
            mean_schi: mean(&scores),
            max_schi: if scores.is_empty() { 0.0 } else { max_schi },
            warnings: self.warnings.len(),
        }
    }
}
