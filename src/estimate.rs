//! The canonical damage estimate and its severity classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Qualitative damage severity derived from a value on the 0-10 scale.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    None,
    Minor,
    Moderate,
    Severe,
    #[serde(rename = "Very severe")]
    VerySevere,
    Catastrophic,
}

impl Severity {
    /// Display label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Minor => "Minor",
            Self::Moderate => "Moderate",
            Self::Severe => "Severe",
            Self::VerySevere => "Very severe",
            Self::Catastrophic => "Catastrophic",
        }
    }

    /// Neighborhood-level status line for this severity ("Severe impact").
    #[must_use]
    pub const fn status(self) -> &'static str {
        match self {
            Self::None => "No impact",
            Self::Minor => "Minor impact",
            Self::Moderate => "Moderate impact",
            Self::Severe => "Severe impact",
            Self::VerySevere => "Very severe impact",
            Self::Catastrophic => "Catastrophic impact",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a damage value.
///
/// Thresholds: below 0.5 is `None`; then upper-inclusive bounds at 2, 4, 6
/// and 8; anything above 8 is `Catastrophic`. Non-finite input is `None`.
///
/// # Examples
///
/// ```
/// use quakeview::{severity_from_value, Severity};
///
/// assert_eq!(severity_from_value(0.5), Severity::Minor);
/// assert_eq!(severity_from_value(2.0), Severity::Minor);
/// assert_eq!(severity_from_value(2.01), Severity::Moderate);
/// assert_eq!(severity_from_value(10.0), Severity::Catastrophic);
/// ```
#[must_use]
pub fn severity_from_value(value: f64) -> Severity {
    if !value.is_finite() || value < 0.5 {
        Severity::None
    } else if value <= 2.0 {
        Severity::Minor
    } else if value <= 4.0 {
        Severity::Moderate
    } else if value <= 6.0 {
        Severity::Severe
    } else if value <= 8.0 {
        Severity::VerySevere
    } else {
        Severity::Catastrophic
    }
}

/// Status line for an average damage level across categories.
#[must_use]
pub fn overall_status(average_damage: f64) -> &'static str {
    severity_from_value(average_damage).status()
}

/// One reconciled estimate for a (neighborhood, category, time).
///
/// Invariants: `value` and both bounds lie in `[0, 10]`,
/// `ci_lower <= ci_upper`, and `certainty` lies in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageEstimate {
    /// Point estimate on the 0-10 scale.
    pub value: f64,
    /// Lower credible bound.
    pub ci_lower: f64,
    /// Upper credible bound.
    pub ci_upper: f64,
    /// Normalized certainty; 0 for no data.
    pub certainty: f64,
    /// Severity class of `value`.
    pub severity: Severity,
    /// Raw reports behind the estimate, where a view fills it in.
    pub report_count: usize,
}

impl DamageEstimate {
    /// Estimate returned when no record exists at all.
    ///
    /// Distinct from a low-certainty zero: its certainty is exactly `0.0`.
    pub const NO_DATA: Self = Self {
        value: 0.0,
        ci_lower: 0.0,
        ci_upper: 0.0,
        certainty: 0.0,
        severity: Severity::None,
        report_count: 0,
    };

    /// True for the no-data sentinel (ignores `report_count`).
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_no_data(&self) -> bool {
        self.value == 0.0 && self.ci_lower == 0.0 && self.ci_upper == 0.0 && self.certainty == 0.0
    }

    /// Returns a copy carrying `count` contributing reports.
    #[must_use]
    pub const fn with_report_count(mut self, count: usize) -> Self {
        self.report_count = count;
        self
    }

    /// Width of the credible interval.
    #[must_use]
    pub fn ci_width(&self) -> f64 {
        self.ci_upper - self.ci_lower
    }
}

impl Default for DamageEstimate {
    fn default() -> Self {
        Self::NO_DATA
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_boundaries() {
        assert_eq!(severity_from_value(0.0), Severity::None);
        assert_eq!(severity_from_value(0.49), Severity::None);
        assert_eq!(severity_from_value(0.5), Severity::Minor);
        assert_eq!(severity_from_value(2.0), Severity::Minor);
        assert_eq!(severity_from_value(2.01), Severity::Moderate);
        assert_eq!(severity_from_value(4.0), Severity::Moderate);
        assert_eq!(severity_from_value(6.0), Severity::Severe);
        assert_eq!(severity_from_value(6.2), Severity::VerySevere);
        assert_eq!(severity_from_value(8.0), Severity::VerySevere);
        assert_eq!(severity_from_value(8.01), Severity::Catastrophic);
        assert_eq!(severity_from_value(10.0), Severity::Catastrophic);
        assert_eq!(severity_from_value(f64::NAN), Severity::None);
    }

    #[test]
    fn test_overall_status() {
        assert_eq!(overall_status(0.1), "No impact");
        assert_eq!(overall_status(3.0), "Moderate impact");
        assert_eq!(overall_status(7.5), "Very severe impact");
        assert_eq!(overall_status(9.0), "Catastrophic impact");
    }

    #[test]
    fn test_severity_serializes_display_names() {
        let json = serde_json::to_string(&Severity::VerySevere).unwrap();
        assert_eq!(json, "\"Very severe\"");
        assert_eq!(Severity::VerySevere.to_string(), "Very severe");
    }

    #[test]
    fn test_no_data_sentinel() {
        let sentinel = DamageEstimate::default();
        assert!(sentinel.is_no_data());
        assert_eq!(sentinel.severity, Severity::None);
        assert!(sentinel.with_report_count(3).is_no_data());
    }

    #[test]
    fn test_estimate_serializes_camel_case() {
        let est = DamageEstimate {
            value: 6.2,
            ci_lower: 5.45,
            ci_upper: 6.95,
            certainty: 0.6,
            severity: Severity::VerySevere,
            report_count: 2,
        };
        let json = serde_json::to_value(est).unwrap();
        assert_eq!(json["ciLower"], 5.45);
        assert_eq!(json["reportCount"], 2);
        assert_eq!(json["severity"], "Very severe");
        assert!((est.ci_width() - 1.5).abs() < 1e-9);
    }
}
