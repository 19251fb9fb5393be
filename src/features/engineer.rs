//! Feature engineering from cleaned per-dataset observations.
//!
//! Commute trips and daily weather readings are grouped by (geography unit, date)
//! and then outer-joined into a [`FeatureTable`].

use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::features::parser::read_records;
use crate::features::types::{FeatureColumn, FeatureRow, FeatureTable};
use crate::index::utility::{mean, stddev};

/// Delay at or above which a trip counts as severely delayed.
pub const SEVERE_DELAY_MIN: f64 = 10.0;

type Key = (String, NaiveDate);

/// A single cleaned commute trip.
#[derive(Debug, Clone, Deserialize)]
pub struct CommuteObservation {
    pub geography_unit_id: String,
    pub date: NaiveDate,
    pub delay_min: f64,
    #[serde(default)]
    pub headway_min: Option<f64>,
    #[serde(default)]
    pub crowd_proxy: Option<f64>,
}

/// A single cleaned weather reading.
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherReading {
    pub geography_unit_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub rain_mm: Option<f64>,
    #[serde(default)]
    pub temp_mean_c: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommuteFeatures {
    pub geography_unit_id: String,
    pub date: NaiveDate,
    pub trip_count: usize,
    pub avg_delay_min: f64,
    pub delay_std: f64,
    pub severe_delay_share: f64,
    pub headway_min: Option<f64>,
    pub crowd_proxy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherFeatures {
    pub geography_unit_id: String,
    pub date: NaiveDate,
    pub rain_mm: Option<f64>,
    pub temp_mean_c: Option<f64>,
    pub temp_anom: Option<f64>,
}

pub const COMMUTE_COLUMNS: [&str; 5] = [
    "geography_unit_id",
    "date",
    "delay_min",
    "headway_min",
    "crowd_proxy",
];

pub const WEATHER_COLUMNS: [&str; 4] = ["geography_unit_id", "date", "rain_mm", "temp_mean_c"];

/// Reads commute trips. Every column in [`COMMUTE_COLUMNS`] must be in the header;
/// headway and crowding cells may be left empty.
pub fn read_commute_observations<R: Read>(reader: R) -> Result<Vec<CommuteObservation>> {
    read_records(reader, &COMMUTE_COLUMNS)
}

/// Reads weather readings. Every column in [`WEATHER_COLUMNS`] must be in the header;
/// rain and temperature cells may be left empty.
pub fn read_weather_readings<R: Read>(reader: R) -> Result<Vec<WeatherReading>> {
    read_records(reader, &WEATHER_COLUMNS)
}

/// Mean of the present values, or `None` when there are none.
fn mean_present(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let present: Vec<f64> = values.flatten().collect();
    if present.is_empty() {
        None
    } else {
        Some(mean(&present))
    }
}

/// Aggregates trips into per-key delay, headway and crowding features, ordered by key.
pub fn build_commute_features(observations: &[CommuteObservation]) -> Vec<CommuteFeatures> {
    let mut grouped: BTreeMap<Key, Vec<&CommuteObservation>> = BTreeMap::new();
    for obs in observations {
        grouped
            .entry((obs.geography_unit_id.clone(), obs.date))
            .or_default()
            .push(obs);
    }

    grouped
        .into_iter()
        .map(|((geography_unit_id, date), trips)| {
            let delays: Vec<f64> = trips.iter().map(|t| t.delay_min).collect();
            let avg = mean(&delays);
            let severe = delays.iter().filter(|d| **d >= SEVERE_DELAY_MIN).count();

            CommuteFeatures {
                geography_unit_id,
                date,
                trip_count: trips.len(),
                avg_delay_min: avg,
                delay_std: stddev(&delays, avg),
                severe_delay_share: severe as f64 / trips.len() as f64,
                headway_min: mean_present(trips.iter().map(|t| t.headway_min)),
                crowd_proxy: mean_present(trips.iter().map(|t| t.crowd_proxy)),
            }
        })
        .collect()
}

/// Aggregates readings into per-key rainfall totals and temperature anomalies.
///
/// The anomaly is the day's mean temperature minus the unit's norm for that calendar
/// month, where the norm is the mean of the unit's daily means in this batch.
pub fn build_weather_features(readings: &[WeatherReading]) -> Vec<WeatherFeatures> {
    let mut grouped: BTreeMap<Key, Vec<&WeatherReading>> = BTreeMap::new();
    for reading in readings {
        grouped
            .entry((reading.geography_unit_id.clone(), reading.date))
            .or_default()
            .push(reading);
    }

    let mut daily: Vec<WeatherFeatures> = grouped
        .into_iter()
        .map(|((geography_unit_id, date), items)| {
            let rain: Vec<f64> = items.iter().filter_map(|r| r.rain_mm).collect();
            WeatherFeatures {
                geography_unit_id,
                date,
                rain_mm: (!rain.is_empty()).then(|| rain.iter().sum::<f64>()),
                temp_mean_c: mean_present(items.iter().map(|r| r.temp_mean_c)),
                temp_anom: None,
            }
        })
        .collect();

    let mut monthly: HashMap<(&str, u32), Vec<f64>> = HashMap::new();
    for day in &daily {
        if let Some(t) = day.temp_mean_c {
            monthly
                .entry((day.geography_unit_id.as_str(), day.date.month()))
                .or_default()
                .push(t);
        }
    }
    let norms: HashMap<(String, u32), f64> = monthly
        .into_iter()
        .map(|((unit, month), temps)| ((unit.to_string(), month), mean(&temps)))
        .collect();

    for day in &mut daily {
        if let Some(t) = day.temp_mean_c {
            let norm = norms
                .get(&(day.geography_unit_id.clone(), day.date.month()))
                .copied()
                .unwrap_or(t);
            day.temp_anom = Some(t - norm);
        }
    }

    daily
}

/// Full outer join of commute and weather features on (geography unit, date).
///
/// All six feature columns are structurally present in the result; a key seen on
/// only one side leaves the other side's readings missing.
#[instrument(skip_all, fields(commute = commute.len(), weather = weather.len()))]
pub fn join_features(
    commute: &[CommuteFeatures],
    weather: &[WeatherFeatures],
) -> Result<FeatureTable> {
    let mut rows: BTreeMap<Key, FeatureRow> = BTreeMap::new();

    for c in commute {
        let key = (c.geography_unit_id.clone(), c.date);
        let row = rows
            .entry(key)
            .or_insert_with(|| FeatureRow::new(c.geography_unit_id.clone(), c.date));
        row.set(FeatureColumn::AvgDelayMin, Some(c.avg_delay_min));
        row.set(FeatureColumn::DelayStd, Some(c.delay_std));
        row.set(FeatureColumn::HeadwayMin, c.headway_min);
        row.set(FeatureColumn::CrowdProxy, c.crowd_proxy);
        debug!(
            unit = %c.geography_unit_id,
            date = %c.date,
            trips = c.trip_count,
            severe_share = c.severe_delay_share,
            "Commute features"
        );
    }

    for w in weather {
        let key = (w.geography_unit_id.clone(), w.date);
        let row = rows
            .entry(key)
            .or_insert_with(|| FeatureRow::new(w.geography_unit_id.clone(), w.date));
        row.set(FeatureColumn::RainMm, w.rain_mm);
        row.set(FeatureColumn::TempAnom, w.temp_anom);
    }

    let table = FeatureTable::from_rows(rows.into_values().collect())?;
    info!(rows = table.len(), "Feature table joined");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InputError, SchiError};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn trip(unit: &str, d: u32, delay: f64) -> CommuteObservation {
        CommuteObservation {
            geography_unit_id: unit.into(),
            date: day(d),
            delay_min: delay,
            headway_min: None,
            crowd_proxy: None,
        }
    }

    fn reading(unit: &str, d: u32, rain: Option<f64>, temp: Option<f64>) -> WeatherReading {
        WeatherReading {
            geography_unit_id: unit.into(),
            date: day(d),
            rain_mm: rain,
            temp_mean_c: temp,
        }
    }

    #[test]
    fn test_commute_features_grouped_per_key() {
        let mut trips = vec![
            trip("101021002", 1, 12.0),
            trip("101021001", 1, 5.0),
            trip("101021001", 1, 7.0),
            trip("101021002", 1, 15.0),
        ];
        trips[1].headway_min = Some(4.0);
        trips[2].headway_min = Some(6.0);

        let features = build_commute_features(&trips);
        assert_eq!(features.len(), 2);

        let inner = &features[0];
        assert_eq!(inner.geography_unit_id, "101021001");
        assert_eq!(inner.trip_count, 2);
        assert_eq!(inner.avg_delay_min, 6.0);
        assert_eq!(inner.delay_std, 1.0);
        assert_eq!(inner.severe_delay_share, 0.0);
        assert_eq!(inner.headway_min, Some(5.0));
        assert_eq!(inner.crowd_proxy, None);

        let outer = &features[1];
        assert_eq!(outer.avg_delay_min, 13.5);
        assert_eq!(outer.severe_delay_share, 1.0);
    }

    #[test]
    fn test_weather_features_rain_total_and_anomaly() {
        let readings = vec![
            reading("A", 1, Some(0.5), Some(20.0)),
            reading("A", 1, Some(1.5), Some(22.0)),
            reading("A", 2, None, Some(27.0)),
            reading("B", 1, Some(4.0), None),
        ];

        let features = build_weather_features(&readings);
        assert_eq!(features.len(), 3);

        // A's January norm is the mean of 21.0 and 27.0
        assert_eq!(features[0].rain_mm, Some(2.0));
        assert_eq!(features[0].temp_mean_c, Some(21.0));
        assert_eq!(features[0].temp_anom, Some(-3.0));
        assert_eq!(features[1].rain_mm, None);
        assert_eq!(features[1].temp_anom, Some(3.0));

        assert_eq!(features[2].rain_mm, Some(4.0));
        assert_eq!(features[2].temp_anom, None);
    }

    #[test]
    fn test_join_is_full_outer() {
        let commute = build_commute_features(&[trip("A", 1, 3.0)]);
        let weather = build_weather_features(&[reading("B", 1, Some(1.0), Some(20.0))]);

        let table = join_features(&commute, &weather).unwrap();
        assert_eq!(table.len(), 2);
        for column in FeatureColumn::ALL {
            assert!(table.has_column(column));
        }

        let a = &table.rows()[0];
        assert_eq!(a.avg_delay_min, Some(3.0));
        assert_eq!(a.rain_mm, None);

        let b = &table.rows()[1];
        assert_eq!(b.avg_delay_min, None);
        assert_eq!(b.rain_mm, Some(1.0));
        assert_eq!(b.temp_anom, Some(0.0));
    }

    #[test]
    fn test_commute_csv_requires_delay_column() {
        let data = "geography_unit_id,date,mood\nA,2025-01-01,4\n";
        assert!(read_commute_observations(data.as_bytes()).is_err());
    }

    #[test]
    fn test_commute_csv_requires_headway_and_crowding_columns() {
        let data = "geography_unit_id,date,delay_min,headway_min\nA,2025-01-01,4,10\n";
        let err = read_commute_observations(data.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            SchiError::Input(InputError::MissingColumn(ref c)) if c == "crowd_proxy"
        ));
    }

    #[test]
    fn test_weather_csv_with_only_keys_is_rejected() {
        let data = "geography_unit_id,date\nA,2025-01-01\nB,2025-01-01\n";
        let err = read_weather_readings(data.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            SchiError::Input(InputError::MissingColumn(ref c)) if c == "rain_mm"
        ));
    }

    #[test]
    fn test_weather_csv_allows_empty_cells() {
        let data = "geography_unit_id,date,rain_mm,temp_mean_c\nA,2025-01-01,,21\nA,2025-01-01,2.5,\n";
        let readings = read_weather_readings(data.as_bytes()).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].rain_mm, None);
        assert_eq!(readings[0].temp_mean_c, Some(21.0));
        assert_eq!(readings[1].rain_mm, Some(2.5));
        assert_eq!(readings[1].temp_mean_c, None);
    }
}
