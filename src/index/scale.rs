//! Min-max scaling onto the unit interval.

use crate::config::{Bounds, ScalingMode};

/// Maps each value to `(x - min) / (max - min)` over the column itself.
///
/// A constant column (including a single value) maps to all zeros. Empty input gives
/// empty output.
pub fn scale(values: &[f64]) -> Vec<f64> {
    let Some(bounds) = batch_bounds(values) else {
        return Vec::new();
    };
    scale_to(values, bounds)
}

/// Scales `values` under `mode`. In reference mode the fixed bounds for `series` are
/// used and results are clamped to [0, 1]; a series without bounds is batch-scaled.
pub fn scale_with(values: &[f64], series: &str, mode: &ScalingMode) -> Vec<f64> {
    match mode {
        ScalingMode::Batch => scale(values),
        ScalingMode::Reference(reference) => match reference.get(series) {
            Some(bounds) => scale_to(values, bounds),
            None => scale(values),
        },
    }
}

fn batch_bounds(values: &[f64]) -> Option<Bounds> {
    let first = *values.first()?;
    let (min, max) = values
        .iter()
        .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    Some(Bounds { min, max })
}

fn scale_to(values: &[f64], Bounds { min, max }: Bounds) -> Vec<f64> {
    let range = max - min;
    if range == 0.0 {
        return vec![0.0; values.len()];
    }
    values
        .iter()
        .map(|v| ((v - min) / range).clamp(0.0, 1.0))
        .collect()
}
