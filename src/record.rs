//! Canonical record shapes produced at ingestion.
//!
//! Source rows spell the same quantity several ways (`value`, `map`, `mean`,
//! `reportValue`) and mix numbers with text. Loaders map every variant onto
//! the structs here, and every numeric field is classified as a [`Reading`]
//! so later stages only ever see present-valid numbers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::category::{Category, LocationId};
use crate::time::parse_instant;

/// Classification of a numeric input field.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Reading {
    /// Present and finite.
    Valid(f64),
    /// Present but not a finite number.
    Invalid,
    /// Missing, null or empty.
    #[default]
    Absent,
}

impl Reading {
    /// Classifies an optional float.
    #[must_use]
    pub fn from_f64(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Self::Valid(v),
            Some(_) => Self::Invalid,
            None => Self::Absent,
        }
    }

    /// Classifies a CSV cell. Empty cells are absent.
    #[must_use]
    pub fn from_cell(cell: &str) -> Self {
        let cell = cell.trim();
        if cell.is_empty() {
            return Self::Absent;
        }
        match cell.parse::<f64>() {
            Ok(v) if v.is_finite() => Self::Valid(v),
            _ => Self::Invalid,
        }
    }

    /// Classifies a JSON field. Numeric strings count as numbers.
    #[must_use]
    pub fn from_json(value: Option<&serde_json::Value>) -> Self {
        match value {
            None | Some(serde_json::Value::Null) => Self::Absent,
            Some(serde_json::Value::Number(n)) => Self::from_f64(n.as_f64()).or_invalid(),
            Some(serde_json::Value::String(s)) => Self::from_cell(s),
            Some(_) => Self::Invalid,
        }
    }

    fn or_invalid(self) -> Self {
        match self {
            Self::Absent => Self::Invalid,
            other => other,
        }
    }

    /// The number, if valid.
    #[must_use]
    pub const fn value(self) -> Option<f64> {
        match self {
            Self::Valid(v) => Some(v),
            Self::Invalid | Self::Absent => None,
        }
    }

    /// True for a usable number.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// True when the field was missing or empty.
    #[must_use]
    pub const fn is_absent(self) -> bool {
        matches!(self, Self::Absent)
    }

    /// First valid reading of `self` and `other`. A present but invalid
    /// reading is kept over an absent one.
    #[must_use]
    pub const fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::Valid(_), _) | (Self::Invalid, Self::Absent) => self,
            _ => other,
        }
    }
}

impl From<f64> for Reading {
    fn from(value: f64) -> Self {
        Self::from_f64(Some(value))
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Valid(v) => serializer.serialize_f64(*v),
            Self::Invalid | Self::Absent => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Reading {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(Self::from_json(raw.as_ref()))
    }
}

/// Access to the identifying triple every indexed record carries.
pub trait Timestamped {
    /// Timestamp of the record.
    fn time(&self) -> DateTime<Utc>;
    /// Neighborhood the record describes.
    fn location(&self) -> &LocationId;
    /// Damage category of the record.
    fn category(&self) -> Category;
}

/// A citizen damage report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawReport {
    /// When the report was made.
    pub time: DateTime<Utc>,
    /// Reporting neighborhood.
    pub location: LocationId,
    /// Damage category.
    pub category: Category,
    /// Reported damage on the 0-10 scale.
    pub value: Reading,
    /// Self-reported numeric certainty.
    pub certainty: Reading,
    /// Self-reported certainty label.
    pub certainty_level: Option<String>,
    /// Reported lower bound.
    pub ci_lower: Reading,
    /// Reported upper bound.
    pub ci_upper: Reading,
    /// Reported credible interval range.
    pub cir: Reading,
}

impl RawReport {
    /// A report carrying only a value.
    #[must_use]
    pub fn new(time: DateTime<Utc>, location: LocationId, category: Category, value: f64) -> Self {
        Self {
            time,
            location,
            category,
            value: Reading::from(value),
            certainty: Reading::Absent,
            certainty_level: None,
            ci_lower: Reading::Absent,
            ci_upper: Reading::Absent,
            cir: Reading::Absent,
        }
    }

    /// Sets the numeric certainty.
    #[must_use]
    pub fn with_certainty(mut self, certainty: f64) -> Self {
        self.certainty = Reading::from(certainty);
        self
    }

    /// Sets the certainty label.
    #[must_use]
    pub fn with_certainty_level(mut self, level: impl Into<String>) -> Self {
        self.certainty_level = Some(level.into());
        self
    }

    /// Sets the CIR.
    #[must_use]
    pub fn with_cir(mut self, cir: f64) -> Self {
        self.cir = Reading::from(cir);
        self
    }

    /// Sets both interval bounds.
    #[must_use]
    pub fn with_ci(mut self, lower: f64, upper: f64) -> Self {
        self.ci_lower = Reading::from(lower);
        self.ci_upper = Reading::from(upper);
        self
    }
}

impl Timestamped for RawReport {
    fn time(&self) -> DateTime<Utc> {
        self.time
    }

    fn location(&self) -> &LocationId {
        &self.location
    }

    fn category(&self) -> Category {
        self.category
    }
}

/// One hourly BSTS model summary for a (location, category).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BstsSummary {
    /// Start of the summarized hour.
    pub time: DateTime<Utc>,
    /// Neighborhood.
    pub location: LocationId,
    /// Damage category.
    pub category: Category,
    /// Canonical value: the MAP estimate, else the posterior mean.
    pub value: Reading,
    /// Model certainty label.
    pub certainty_level: Option<String>,
    /// Credible interval range.
    pub cir: Reading,
    /// Posterior standard deviation.
    pub sd: Reading,
    /// Lower 95% credible bound.
    pub ci_lower95: Reading,
    /// Upper 95% credible bound.
    pub ci_upper95: Reading,
}

impl BstsSummary {
    /// A summary carrying only a MAP value.
    #[must_use]
    pub fn new(time: DateTime<Utc>, location: LocationId, category: Category, map: f64) -> Self {
        Self {
            time,
            location,
            category,
            value: Reading::from(map),
            certainty_level: None,
            cir: Reading::Absent,
            sd: Reading::Absent,
            ci_lower95: Reading::Absent,
            ci_upper95: Reading::Absent,
        }
    }

    /// Sets the CIR.
    #[must_use]
    pub fn with_cir(mut self, cir: f64) -> Self {
        self.cir = Reading::from(cir);
        self
    }

    /// Sets the SD.
    #[must_use]
    pub fn with_sd(mut self, sd: f64) -> Self {
        self.sd = Reading::from(sd);
        self
    }

    /// Sets the certainty label.
    #[must_use]
    pub fn with_certainty_level(mut self, level: impl Into<String>) -> Self {
        self.certainty_level = Some(level.into());
        self
    }

    /// Sets both 95% bounds.
    #[must_use]
    pub fn with_ci95(mut self, lower: f64, upper: f64) -> Self {
        self.ci_lower95 = Reading::from(lower);
        self.ci_upper95 = Reading::from(upper);
        self
    }
}

impl Timestamped for BstsSummary {
    fn time(&self) -> DateTime<Utc> {
        self.time
    }

    fn location(&self) -> &LocationId {
        &self.location
    }

    fn category(&self) -> Category {
        self.category
    }
}

/// One point of the aggregated hourly forecast series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedPoint {
    /// Hour of the point.
    pub time: DateTime<Utc>,
    /// Neighborhood.
    pub location: LocationId,
    /// Damage category.
    pub category: Category,
    /// MAP estimate for the hour.
    pub map: Reading,
    /// CIR at the maximum MAP within the hour.
    pub cir: Reading,
}

impl Timestamped for AggregatedPoint {
    fn time(&self) -> DateTime<Utc> {
        self.time
    }

    fn location(&self) -> &LocationId {
        &self.location
    }

    fn category(&self) -> Category {
        self.category
    }
}

/// Why a source row could not become a record.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowRejection {
    MissingLocation,
    UnknownCategory,
    BadTime,
}

impl RowRejection {
    /// Short reason for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingLocation => "missing location",
            Self::UnknownCategory => "unknown category",
            Self::BadTime => "unparseable time",
        }
    }
}

fn text_of(value: &serde_json::Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

pub(crate) fn identify(
    location: &serde_json::Value,
    category: &serde_json::Value,
    time: &serde_json::Value,
) -> Result<(LocationId, Category, DateTime<Utc>), RowRejection> {
    let location = LocationId::from_json(location).ok_or(RowRejection::MissingLocation)?;
    let category = text_of(category)
        .and_then(Category::parse_lenient)
        .ok_or(RowRejection::UnknownCategory)?;
    let time = text_of(time)
        .and_then(parse_instant)
        .ok_or(RowRejection::BadTime)?;
    Ok((location, category, time))
}

fn label_of(value: Option<serde_json::Value>) -> Option<String> {
    value.as_ref().and_then(text_of).map(str::to_string)
}

/// A BSTS summary row as found in JSON, snake_case or camelCase.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BstsRow {
    #[serde(alias = "loc", alias = "neighborhood")]
    pub location: serde_json::Value,
    pub category: serde_json::Value,
    #[serde(alias = "dateHour", alias = "timestamp")]
    pub time: serde_json::Value,
    #[serde(alias = "MAP")]
    pub map: Reading,
    pub mean: Reading,
    pub value: Reading,
    #[serde(alias = "certaintyLevel")]
    pub certainty_level: Option<serde_json::Value>,
    #[serde(alias = "CIR")]
    pub cir: Reading,
    #[serde(alias = "SD")]
    pub sd: Reading,
    #[serde(alias = "ci_lower_95", alias = "ciLower95")]
    pub ci_lower95: Reading,
    #[serde(alias = "ci_upper_95", alias = "ciUpper95")]
    pub ci_upper95: Reading,
}

impl BstsRow {
    /// Converts the row into a summary.
    ///
    /// # Errors
    ///
    /// Returns the reason when the location, category or time is unusable.
    pub fn into_summary(self) -> Result<BstsSummary, RowRejection> {
        let (location, category, time) = identify(&self.location, &self.category, &self.time)?;
        Ok(BstsSummary {
            time,
            location,
            category,
            value: self.map.or(self.mean).or(self.value),
            certainty_level: label_of(self.certainty_level),
            cir: self.cir,
            sd: self.sd,
            ci_lower95: self.ci_lower95,
            ci_upper95: self.ci_upper95,
        })
    }
}

/// A long-format raw report row as found in JSON.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawReportRow {
    #[serde(alias = "loc", alias = "neighborhood")]
    pub location: serde_json::Value,
    pub category: serde_json::Value,
    #[serde(alias = "timestamp")]
    pub time: serde_json::Value,
    pub value: Reading,
    #[serde(alias = "reportValue")]
    pub report_value: Reading,
    pub certainty: Reading,
    #[serde(alias = "certaintyLevel")]
    pub certainty_level: Option<serde_json::Value>,
    #[serde(alias = "ciLower")]
    pub ci_lower: Reading,
    #[serde(alias = "ciUpper")]
    pub ci_upper: Reading,
    #[serde(alias = "ci_lower_95")]
    pub ci_lower95: Reading,
    #[serde(alias = "ci_upper_95")]
    pub ci_upper95: Reading,
    #[serde(alias = "CIR")]
    pub cir: Reading,
}

impl RawReportRow {
    /// Converts the row into a report.
    ///
    /// Explicit bounds fall back to the 95% bounds when the plain pair is not
    /// fully valid.
    ///
    /// # Errors
    ///
    /// Returns the reason when the location, category or time is unusable.
    pub fn into_report(self) -> Result<RawReport, RowRejection> {
        let (location, category, time) = identify(&self.location, &self.category, &self.time)?;
        let (ci_lower, ci_upper) = if self.ci_lower.is_valid() && self.ci_upper.is_valid() {
            (self.ci_lower, self.ci_upper)
        } else if self.ci_lower95.is_valid() && self.ci_upper95.is_valid() {
            (self.ci_lower95, self.ci_upper95)
        } else {
            (self.ci_lower, self.ci_upper)
        };
        Ok(RawReport {
            time,
            location,
            category,
            value: self.value.or(self.report_value),
            certainty: self.certainty,
            certainty_level: label_of(self.certainty_level),
            ci_lower,
            ci_upper,
            cir: self.cir,
        })
    }
}
