//! Typed feature rows and the feature table they form.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// One of the six raw feature columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeatureColumn {
    AvgDelayMin,
    DelayStd,
    HeadwayMin,
    RainMm,
    TempAnom,
    CrowdProxy,
}

impl FeatureColumn {
    pub const ALL: [FeatureColumn; 6] = [
        FeatureColumn::AvgDelayMin,
        FeatureColumn::DelayStd,
        FeatureColumn::HeadwayMin,
        FeatureColumn::RainMm,
        FeatureColumn::TempAnom,
        FeatureColumn::CrowdProxy,
    ];

    /// Column name as it appears in CSV headers.
    pub fn name(self) -> &'static str {
        match self {
            FeatureColumn::AvgDelayMin => "avg_delay_min",
            FeatureColumn::DelayStd => "delay_std",
            FeatureColumn::HeadwayMin => "headway_min",
            FeatureColumn::RainMm => "rain_mm",
            FeatureColumn::TempAnom => "temp_anom",
            FeatureColumn::CrowdProxy => "crowd_proxy",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Temperature anomaly is signed; every other column is a non-negative burden.
    pub fn allows_negative(self) -> bool {
        matches!(self, FeatureColumn::TempAnom)
    }
}

impl fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single (geography unit, date) record. `None` means no reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub geography_unit_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub avg_delay_min: Option<f64>,
    #[serde(default)]
    pub delay_std: Option<f64>,
    #[serde(default)]
    pub headway_min: Option<f64>,
    #[serde(default)]
    pub rain_mm: Option<f64>,
    #[serde(default)]
    pub temp_anom: Option<f64>,
    #[serde(default)]
    pub crowd_proxy: Option<f64>,
}

impl FeatureRow {
    /// A row with every reading missing.
    pub fn new(geography_unit_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            geography_unit_id: geography_unit_id.into(),
            date,
            avg_delay_min: None,
            delay_std: None,
            headway_min: None,
            rain_mm: None,
            temp_anom: None,
            crowd_proxy: None,
        }
    }

    pub fn get(&self, column: FeatureColumn) -> Option<f64> {
        match column {
            FeatureColumn::AvgDelayMin => self.avg_delay_min,
            FeatureColumn::DelayStd => self.delay_std,
            FeatureColumn::HeadwayMin => self.headway_min,
            FeatureColumn::RainMm => self.rain_mm,
            FeatureColumn::TempAnom => self.temp_anom,
            FeatureColumn::CrowdProxy => self.crowd_proxy,
        }
    }

    pub fn set(&mut self, column: FeatureColumn, value: Option<f64>) {
        let slot = match column {
            FeatureColumn::AvgDelayMin => &mut self.avg_delay_min,
            FeatureColumn::DelayStd => &mut self.delay_std,
            FeatureColumn::HeadwayMin => &mut self.headway_min,
            FeatureColumn::RainMm => &mut self.rain_mm,
            FeatureColumn::TempAnom => &mut self.temp_anom,
            FeatureColumn::CrowdProxy => &mut self.crowd_proxy,
        };
        *slot = value;
    }

    /// Builder form of [`FeatureRow::set`] with a present reading.
    pub fn with(mut self, column: FeatureColumn, value: f64) -> Self {
        self.set(column, Some(value));
        self
    }
}

/// Rows keyed by (geography unit, date) plus the set of columns the source provided.
///
/// A column absent from `columns` is structurally missing, which is different from a
/// present column whose cells are all `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
    columns: BTreeSet<FeatureColumn>,
}

impl FeatureTable {
    /// Validates keys and values. Rejects duplicate keys, non-finite readings and
    /// negative readings in non-negative columns.
    pub fn new(
        rows: Vec<FeatureRow>,
        columns: impl IntoIterator<Item = FeatureColumn>,
    ) -> Result<Self, InputError> {
        let columns: BTreeSet<FeatureColumn> = columns.into_iter().collect();

        let mut seen = HashSet::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            if !seen.insert((row.geography_unit_id.as_str(), row.date)) {
                return Err(InputError::DuplicateKey {
                    geography_unit_id: row.geography_unit_id.clone(),
                    date: row.date.to_string(),
                });
            }

            for column in FeatureColumn::ALL {
                if let Some(value) = row.get(column) {
                    if !value.is_finite() || (value < 0.0 && !column.allows_negative()) {
                        return Err(InputError::InvalidValue {
                            column: column.name().to_string(),
                            row: idx + 1,
                            value: value.to_string(),
                        });
                    }
                }
            }
        }

        Ok(Self { rows, columns })
    }

    /// A table where all six columns are structurally present.
    pub fn from_rows(rows: Vec<FeatureRow>) -> Result<Self, InputError> {
        Self::new(rows, FeatureColumn::ALL)
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: FeatureColumn) -> bool {
        self.columns.contains(&column)
    }

    pub fn columns(&self) -> impl Iterator<Item = FeatureColumn> + '_ {
        self.columns.iter().copied()
    }

    /// Returns the readings of `column` in row order.
    ///
    /// # Errors
    ///
    /// [`InputError::MissingColumn`] if the column is structurally absent.
    pub fn column(&self, column: FeatureColumn) -> Result<Vec<Option<f64>>, InputError> {
        if !self.has_column(column) {
            return Err(InputError::MissingColumn(column.name().to_string()));
        }
        Ok(self.rows.iter().map(|r| r.get(column)).collect())
    }
}
