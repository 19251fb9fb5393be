//! Immutable run settings.
//!
//! [`Settings`] is built once at process start from the environment (or any key
//! lookup, for tests) and then passed by reference into every calculator. Nothing
//! below the binary reads the environment.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

pub const DEFAULT_WEIGHTS: [f64; 4] = [0.35, 0.25, 0.20, 0.20];
pub const DEFAULT_TIMEZONE: &str = "Australia/Sydney";
pub const DEFAULT_CACHE_DAYS: u32 = 7;
pub const DEFAULT_MISSING_WARN_THRESHOLD: f64 = 0.2;

const WEIGHT_TOLERANCE: f64 = 1e-9;

/// The four SCHI weights. Only constructible through [`Weights::new`], so any value
/// of this type is non-negative and sums to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Weights {
    rs: f64,
    access: f64,
    wc: f64,
    cx: f64,
}

impl Weights {
    pub fn new(rs: f64, access: f64, wc: f64, cx: f64) -> std::result::Result<Self, ConfigError> {
        for (name, value) in [("W_RS", rs), ("W_AS", access), ("W_WC", wc), ("W_CX", cx)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }

        let sum = rs + access + wc + cx;
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigError::WeightSum { sum });
        }

        Ok(Self {
            rs,
            access,
            wc,
            cx,
        })
    }

    pub fn rs(&self) -> f64 {
        self.rs
    }

    pub fn access(&self) -> f64 {
        self.access
    }

    pub fn wc(&self) -> f64 {
        self.wc
    }

    pub fn cx(&self) -> f64 {
        self.cx
    }
}

impl Default for Weights {
    fn default() -> Self {
        let [rs, access, wc, cx] = DEFAULT_WEIGHTS;
        Self {
            rs,
            access,
            wc,
            cx,
        }
    }
}

/// Primary geography used as the aggregation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Geography {
    #[default]
    #[serde(rename = "SA2")]
    Sa2,
    #[serde(rename = "LGA")]
    Lga,
}

impl FromStr for Geography {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SA2" => Ok(Geography::Sa2),
            "LGA" => Ok(Geography::Lga),
            _ => Err(ConfigError::Parse {
                key: "SCHI_GEOGRAPHY",
                value: s.to_string(),
                reason: "expected SA2 or LGA".into(),
            }),
        }
    }
}

impl fmt::Display for Geography {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Geography::Sa2 => write!(f, "SA2"),
            Geography::Lga => write!(f, "LGA"),
        }
    }
}

/// Inclusive bounds for one scaled series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

/// Fixed scaling references keyed by series name.
///
/// Stored as a plain JSON object on disk:
/// ```json
/// {
///   "avg_delay_min": { "min": 0.0, "max": 30.0 },
///   "rain_mm": { "min": 0.0, "max": 80.0 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReferenceBounds {
    entries: HashMap<String, Bounds>,
}

impl ReferenceBounds {
    /// Loads the bounds from a JSON file at `path`. An unreadable or malformed file is
    /// a [`ConfigError::ReferenceBoundsFile`].
    pub fn load(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let file_error = |reason: String| ConfigError::ReferenceBoundsFile {
            path: path.display().to_string(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
        let entries: HashMap<String, Bounds> =
            serde_json::from_str(&content).map_err(|e| file_error(e.to_string()))?;
        Self::new(entries)
    }

    pub fn from_json(content: &str) -> std::result::Result<Self, ConfigError> {
        let entries: HashMap<String, Bounds> =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse {
                key: "SCHI_REFERENCE_BOUNDS",
                value: content.to_string(),
                reason: e.to_string(),
            })?;
        Self::new(entries)
    }

    pub fn new(entries: HashMap<String, Bounds>) -> std::result::Result<Self, ConfigError> {
        for (column, b) in &entries {
            if !b.min.is_finite() || !b.max.is_finite() || b.max < b.min {
                return Err(ConfigError::InvertedBounds {
                    column: column.clone(),
                    min: b.min,
                    max: b.max,
                });
            }
        }
        Ok(Self { entries })
    }

    /// Returns the bounds configured for `series`, if any.
    pub fn get(&self, series: &str) -> Option<Bounds> {
        self.entries.get(series).copied()
    }
}

/// How raw columns are mapped onto the unit interval.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "mode", content = "bounds", rename_all = "lowercase")]
pub enum ScalingMode {
    /// Min-max against the batch being scored. Scores are only comparable within a run.
    #[default]
    Batch,
    /// Min-max against fixed bounds; series without bounds fall back to batch scaling.
    Reference(ReferenceBounds),
}

/// Settings shared read-only by every stage of a run.
///
/// Fields are private so that a value built by [`Settings::from_lookup`] or the
/// `with_*` builders always holds validated weights and a threshold in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    timezone: String,
    geography: Geography,
    cache_days: u32,
    weights: Weights,
    missing_warn_threshold: f64,
    scaling: ScalingMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            geography: Geography::default(),
            cache_days: DEFAULT_CACHE_DAYS,
            weights: Weights::default(),
            missing_warn_threshold: DEFAULT_MISSING_WARN_THRESHOLD,
            scaling: ScalingMode::default(),
        }
    }
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup. Unset keys take their defaults;
    /// set-but-invalid keys are a [`ConfigError`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let weights = match get("SCHI_WEIGHTS") {
            Some(raw) => parse_weight_list(&raw)?,
            None => {
                let [rs, access, wc, cx] = DEFAULT_WEIGHTS;
                Weights::new(
                    parse_or("SCHI_W_RS", get("SCHI_W_RS"), rs)?,
                    parse_or("SCHI_W_AS", get("SCHI_W_AS"), access)?,
                    parse_or("SCHI_W_WC", get("SCHI_W_WC"), wc)?,
                    parse_or("SCHI_W_CX", get("SCHI_W_CX"), cx)?,
                )?
            }
        };

        let timezone = get("SCHI_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        validate_timezone(&timezone)?;

        let geography = match get("SCHI_GEOGRAPHY") {
            Some(raw) => raw.parse::<Geography>()?,
            None => Geography::default(),
        };

        let cache_days = parse_or("SCHI_CACHE_DAYS", get("SCHI_CACHE_DAYS"), DEFAULT_CACHE_DAYS)?;

        let missing_warn_threshold = validate_threshold(parse_or(
            "SCHI_MISSING_WARN_THRESHOLD",
            get("SCHI_MISSING_WARN_THRESHOLD"),
            DEFAULT_MISSING_WARN_THRESHOLD,
        )?)?;

        let scaling = match get("SCHI_SCALING").as_deref().map(str::to_ascii_lowercase) {
            None => ScalingMode::Batch,
            Some(mode) if mode == "batch" => ScalingMode::Batch,
            Some(mode) if mode == "reference" => {
                let path = get("SCHI_REFERENCE_BOUNDS")
                    .ok_or(ConfigError::MissingReferenceBounds("SCHI_REFERENCE_BOUNDS"))?;
                ScalingMode::Reference(ReferenceBounds::load(path)?)
            }
            Some(other) => {
                return Err(ConfigError::Parse {
                    key: "SCHI_SCALING",
                    value: other,
                    reason: "expected batch or reference".into(),
                }
                .into());
            }
        };

        let settings = Settings {
            timezone,
            geography,
            cache_days,
            weights,
            missing_warn_threshold,
            scaling,
        };
        debug!(?settings, "Settings resolved");
        Ok(settings)
    }

    pub fn with_weights(mut self, weights: Weights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_scaling(mut self, scaling: ScalingMode) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn with_missing_warn_threshold(
        mut self,
        threshold: f64,
    ) -> std::result::Result<Self, ConfigError> {
        self.missing_warn_threshold = validate_threshold(threshold)?;
        Ok(self)
    }

    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    pub fn geography(&self) -> Geography {
        self.geography
    }

    pub fn cache_days(&self) -> u32 {
        self.cache_days
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    /// Missing fraction above which an imputed column raises a warning.
    pub fn missing_warn_threshold(&self) -> f64 {
        self.missing_warn_threshold
    }

    pub fn scaling(&self) -> &ScalingMode {
        &self.scaling
    }
}

fn parse_weight_list(raw: &str) -> std::result::Result<Weights, ConfigError> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(ConfigError::WeightCount {
            key: "SCHI_WEIGHTS",
            count: parts.len(),
        });
    }

    let mut values = [0.0; 4];
    for (slot, part) in values.iter_mut().zip(&parts) {
        *slot = part.parse::<f64>().map_err(|e| ConfigError::Parse {
            key: "SCHI_WEIGHTS",
            value: raw.to_string(),
            reason: e.to_string(),
        })?;
    }

    let [rs, access, wc, cx] = values;
    Weights::new(rs, access, wc, cx)
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> std::result::Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse::<T>().map_err(|e| ConfigError::Parse {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

fn validate_threshold(threshold: f64) -> std::result::Result<f64, ConfigError> {
    // NaN fails the range check too
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(ConfigError::Parse {
            key: "SCHI_MISSING_WARN_THRESHOLD",
            value: threshold.to_string(),
            reason: "expected a fraction in [0, 1]".into(),
        })
    }
}

fn validate_timezone(tz: &str) -> std::result::Result<(), ConfigError> {
    let shaped = tz == "UTC"
        || (tz.contains('/')
            && !tz.starts_with('/')
            && !tz.ends_with('/')
            && !tz.chars().any(char::is_whitespace));
    if shaped {
        Ok(())
    } else {
        Err(ConfigError::Parse {
            key: "SCHI_TIMEZONE",
            value: tz.to_string(),
            reason: "expected an IANA zone such as Australia/Sydney".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchiError;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_weights_are_valid() {
        let w = Weights::default();
        assert_eq!(Weights::new(0.35, 0.25, 0.20, 0.20).unwrap(), w);
    }

    #[test]
    fn test_weights_over_one_rejected() {
        let err = Weights::new(0.4, 0.3, 0.2, 0.2).unwrap_err();
        assert!(matches!(err, ConfigError::WeightSum { .. }));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let err = Weights::new(1.2, -0.2, 0.0, 0.0).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidWeight {
                name: "W_AS",
                value: -0.2
            }
        );
    }

    #[test]
    fn test_nan_weight_rejected() {
        assert!(Weights::new(f64::NAN, 0.5, 0.25, 0.25).is_err());
    }

    #[test]
    fn test_empty_lookup_uses_defaults() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.timezone(), "Australia/Sydney");
        assert_eq!(settings.geography(), Geography::Sa2);
        assert_eq!(settings.cache_days(), 7);
        assert_eq!(settings.missing_warn_threshold(), 0.2);
        assert_eq!(settings.scaling(), &ScalingMode::Batch);
    }

    #[test]
    fn test_comma_separated_weights() {
        let settings =
            Settings::from_lookup(lookup_from(&[("SCHI_WEIGHTS", "0.25, 0.25, 0.25, 0.25")]))
                .unwrap();
        assert_eq!(settings.weights().rs(), 0.25);
        assert_eq!(settings.weights().cx(), 0.25);
    }

    #[test]
    fn test_comma_separated_weights_take_precedence() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("SCHI_WEIGHTS", "0.4,0.2,0.2,0.2"),
            ("SCHI_W_RS", "0.9"),
        ]))
        .unwrap();
        assert_eq!(settings.weights().rs(), 0.4);
    }

    #[test]
    fn test_wrong_weight_count() {
        let err = Settings::from_lookup(lookup_from(&[("SCHI_WEIGHTS", "0.5,0.5")])).unwrap_err();
        assert!(matches!(
            err,
            SchiError::Config(ConfigError::WeightCount { count: 2, .. })
        ));
    }

    #[test]
    fn test_individual_weights_with_defaults() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("SCHI_W_RS", "0.45"),
            ("SCHI_W_AS", "0.15"),
        ]))
        .unwrap();
        assert_eq!(settings.weights().rs(), 0.45);
        assert_eq!(settings.weights().access(), 0.15);
        assert_eq!(settings.weights().wc(), 0.20);
    }

    #[test]
    fn test_individual_weights_bad_sum() {
        let err = Settings::from_lookup(lookup_from(&[("SCHI_W_RS", "0.5")])).unwrap_err();
        assert!(matches!(err, SchiError::Config(ConfigError::WeightSum { .. })));
    }

    #[test]
    fn test_unparseable_weight() {
        let err = Settings::from_lookup(lookup_from(&[("SCHI_W_CX", "lots")])).unwrap_err();
        assert!(matches!(
            err,
            SchiError::Config(ConfigError::Parse { key: "SCHI_W_CX", .. })
        ));
    }

    #[test]
    fn test_geography_parsing() {
        assert_eq!("lga".parse::<Geography>().unwrap(), Geography::Lga);
        assert_eq!(" SA2 ".parse::<Geography>().unwrap(), Geography::Sa2);
        assert!("postcode".parse::<Geography>().is_err());
    }

    #[test]
    fn test_timezone_validation() {
        assert!(Settings::from_lookup(lookup_from(&[("SCHI_TIMEZONE", "UTC")])).is_ok());
        assert!(
            Settings::from_lookup(lookup_from(&[("SCHI_TIMEZONE", "Sydney time")])).is_err()
        );
    }

    #[test]
    fn test_threshold_out_of_range() {
        let err = Settings::from_lookup(lookup_from(&[("SCHI_MISSING_WARN_THRESHOLD", "1.5")]))
            .unwrap_err();
        assert!(matches!(err, SchiError::Config(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_reference_scaling_requires_bounds_path() {
        let err =
            Settings::from_lookup(lookup_from(&[("SCHI_SCALING", "reference")])).unwrap_err();
        assert!(matches!(
            err,
            SchiError::Config(ConfigError::MissingReferenceBounds(_))
        ));
    }

    #[test]
    fn test_reference_bounds_from_json() {
        let bounds = ReferenceBounds::from_json(
            r#"{ "avg_delay_min": { "min": 0.0, "max": 30.0 } }"#,
        )
        .unwrap();
        assert_eq!(
            bounds.get("avg_delay_min"),
            Some(Bounds {
                min: 0.0,
                max: 30.0
            })
        );
        assert_eq!(bounds.get("rain_mm"), None);
    }

    #[test]
    fn test_reference_bounds_inverted() {
        let err = ReferenceBounds::from_json(r#"{ "rain_mm": { "min": 5.0, "max": 1.0 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvertedBounds { .. }));
    }

    #[test]
    fn test_reference_bounds_malformed_json() {
        let err = ReferenceBounds::from_json("not json").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Parse {
                key: "SCHI_REFERENCE_BOUNDS",
                ..
            }
        ));
    }

    #[test]
    fn test_reference_scaling_loads_file() {
        let path = format!(
            "{}/sydney_pulse_test_bounds.json",
            std::env::temp_dir().display()
        );
        std::fs::write(&path, r#"{ "headway_min": { "min": 2.0, "max": 60.0 } }"#).unwrap();

        let settings = Settings::from_lookup(lookup_from(&[
            ("SCHI_SCALING", "Reference"),
            ("SCHI_REFERENCE_BOUNDS", path.as_str()),
        ]))
        .unwrap();

        match settings.scaling() {
            ScalingMode::Reference(bounds) => assert!(bounds.get("headway_min").is_some()),
            ScalingMode::Batch => panic!("expected reference scaling"),
        }

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_reference_scaling_malformed_file_is_config_error() {
        let path = format!(
            "{}/sydney_pulse_test_bad_bounds.json",
            std::env::temp_dir().display()
        );
        std::fs::write(&path, "not json").unwrap();

        let err = Settings::from_lookup(lookup_from(&[
            ("SCHI_SCALING", "reference"),
            ("SCHI_REFERENCE_BOUNDS", path.as_str()),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            SchiError::Config(ConfigError::ReferenceBoundsFile { .. })
        ));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_reference_scaling_missing_file_is_config_error() {
        let path = format!(
            "{}/sydney_pulse_test_no_such_bounds.json",
            std::env::temp_dir().display()
        );
        let _ = std::fs::remove_file(&path);

        let err = Settings::from_lookup(lookup_from(&[
            ("SCHI_SCALING", "reference"),
            ("SCHI_REFERENCE_BOUNDS", path.as_str()),
        ]))
        .unwrap_err();
        match err {
            SchiError::Config(ConfigError::ReferenceBoundsFile { path: reported, .. }) => {
                assert_eq!(reported, path)
            }
            other => panic!("expected a config error, got {other:?}"),
        }
    }

    #[test]
    fn test_threshold_builder_rejects_out_of_range() {
        assert!(Settings::default().with_missing_warn_threshold(f64::NAN).is_err());
        assert!(Settings::default().with_missing_warn_threshold(5.0).is_err());

        let settings = Settings::default().with_missing_warn_threshold(0.5).unwrap();
        assert_eq!(settings.missing_warn_threshold(), 0.5);
    }
}
