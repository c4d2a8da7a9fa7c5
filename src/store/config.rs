//! Store configuration.

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::certainty::{DEFAULT_MAX_CREDIBLE_CIR, DEFAULT_MAX_EXPECTED_SD};
use crate::error::ConfigError;
use crate::normalize::NormalizeParams;

/// File names of each dataset inside the data directory.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetFiles {
    pub geography: String,
    pub neighborhood_map: String,
    /// `.csv` (long or wide layout) or `.json` rows.
    pub raw_reports: String,
    pub bsts_summaries: String,
    pub aggregated_series: String,
}

impl Default for DatasetFiles {
    fn default() -> Self {
        Self {
            geography: "neighborhoods.geojson".to_string(),
            neighborhood_map: "neighborhood_map.json".to_string(),
            raw_reports: "reports.csv".to_string(),
            bsts_summaries: "bsts_summaries.json".to_string(),
            aggregated_series: "summary_aggregated.csv".to_string(),
        }
    }
}

/// Configuration for the data store and its file source.
///
/// # Examples
///
/// ```
/// use quakeview::StoreConfig;
///
/// let config: StoreConfig = serde_json::from_str(r#"{"raw_window_hours": 3}"#).unwrap();
/// let config = config.validate().unwrap();
/// assert_eq!(config.raw_window().num_hours(), 3);
/// assert_eq!(config.files.raw_reports, "reports.csv");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the dataset files.
    pub data_dir: PathBuf,
    /// Dataset file names inside `data_dir`.
    pub files: DatasetFiles,
    /// Half-width of the raw-report comparison window, in hours.
    pub raw_window_hours: f64,
    /// CIR at which certainty bottoms out.
    pub max_credible_cir: f64,
    /// SD at which certainty bottoms out.
    pub max_expected_sd: f64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            files: DatasetFiles::default(),
            raw_window_hours: 6.0,
            max_credible_cir: DEFAULT_MAX_CREDIBLE_CIR,
            max_expected_sd: DEFAULT_MAX_EXPECTED_SD,
        }
    }
}

/// Largest accepted raw-report comparison half-window: one leap year.
pub const MAX_RAW_WINDOW_HOURS: f64 = 366.0 * 24.0;

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::EmptyField { field })
    } else {
        Ok(())
    }
}

impl StoreConfig {
    /// Checks every field, returning the config unchanged when valid.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(self) -> Result<Self, ConfigError> {
        positive("raw_window_hours", self.raw_window_hours)?;
        if self.raw_window_hours > MAX_RAW_WINDOW_HOURS {
            return Err(ConfigError::TooLarge {
                field: "raw_window_hours",
                value: self.raw_window_hours,
                max: MAX_RAW_WINDOW_HOURS,
            });
        }
        positive("max_credible_cir", self.max_credible_cir)?;
        positive("max_expected_sd", self.max_expected_sd)?;

        non_empty("files.geography", &self.files.geography)?;
        non_empty("files.neighborhood_map", &self.files.neighborhood_map)?;
        non_empty("files.raw_reports", &self.files.raw_reports)?;
        non_empty("files.bsts_summaries", &self.files.bsts_summaries)?;
        non_empty("files.aggregated_series", &self.files.aggregated_series)?;

        Ok(self)
    }

    /// Reads and validates a JSON config file. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, then parse or
    /// validation errors.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()
    }

    /// Raw-report comparison half-window, clamped to the accepted range.
    #[must_use]
    pub fn raw_window(&self) -> Duration {
        let hours = if self.raw_window_hours.is_finite() {
            self.raw_window_hours.clamp(0.0, MAX_RAW_WINDOW_HOURS)
        } else {
            0.0
        };
        #[allow(clippy::cast_possible_truncation)]
        let millis = (hours * 3_600_000.0).round() as i64;
        Duration::milliseconds(millis)
    }

    /// Scale constants for the normalizer.
    #[must_use]
    pub const fn normalize_params(&self) -> NormalizeParams {
        NormalizeParams {
            max_credible_cir: self.max_credible_cir,
            max_expected_sd: self.max_expected_sd,
        }
    }

    /// Full path of a dataset file.
    #[must_use]
    pub fn path_of(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = StoreConfig::default().validate().unwrap();
        assert_eq!(config.raw_window(), Duration::hours(6));
        assert_eq!(config.normalize_params(), NormalizeParams::default());
    }

    #[test]
    fn test_validate_rejects_non_positive() {
        let config = StoreConfig {
            raw_window_hours: 0.0,
            ..StoreConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::NotPositive { field: "raw_window_hours", .. }));

        let config = StoreConfig {
            max_credible_cir: f64::NAN,
            ..StoreConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_window() {
        let config = StoreConfig {
            raw_window_hours: 1e10,
            ..StoreConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge { field: "raw_window_hours", .. }));

        let config = StoreConfig {
            raw_window_hours: MAX_RAW_WINDOW_HOURS,
            ..StoreConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_file_name() {
        let mut config = StoreConfig::default();
        config.files.bsts_summaries = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::EmptyField { field: "files.bsts_summaries" }));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"data_dir": "/srv/quake", "files": {{"raw_reports": "mc1.csv"}}, "max_expected_sd": 3.0}}"#)
            .unwrap();
        let config = StoreConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/quake"));
        assert_eq!(config.files.raw_reports, "mc1.csv");
        assert_eq!(config.files.geography, "neighborhoods.geojson");
        assert!((config.max_expected_sd - 3.0).abs() < f64::EPSILON);
        assert_eq!(config.path_of("mc1.csv"), PathBuf::from("/srv/quake/mc1.csv"));
    }

    #[test]
    fn test_from_json_file_errors() {
        let err = StoreConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = StoreConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
