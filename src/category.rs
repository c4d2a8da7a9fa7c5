//! Damage categories and neighborhood identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};

/// The fixed set of damage categories surveyed per neighborhood.
///
/// # Examples
///
/// ```
/// use quakeview::Category;
///
/// let c: Category = "Roads and Bridges".parse().unwrap();
/// assert_eq!(c, Category::RoadsAndBridges);
/// assert_eq!(c.as_str(), "roads_and_bridges");
/// ```
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ShakeIntensity,
    Buildings,
    Power,
    RoadsAndBridges,
    Medical,
    SewerAndWater,
}

impl Category {
    /// All categories in display order.
    pub const ALL: [Self; 6] = [
        Self::ShakeIntensity,
        Self::Buildings,
        Self::Power,
        Self::RoadsAndBridges,
        Self::Medical,
        Self::SewerAndWater,
    ];

    /// Snake-case identifier used in datasets.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ShakeIntensity => "shake_intensity",
            Self::Buildings => "buildings",
            Self::Power => "power",
            Self::RoadsAndBridges => "roads_and_bridges",
            Self::Medical => "medical",
            Self::SewerAndWater => "sewer_and_water",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ShakeIntensity => "Shake Intensity",
            Self::Buildings => "Buildings",
            Self::Power => "Power",
            Self::RoadsAndBridges => "Roads & Bridges",
            Self::Medical => "Medical",
            Self::SewerAndWater => "Sewer & Water",
        }
    }

    /// Parses a dataset spelling, tolerating case, spaces and `&`
    /// ("Sewer and Water", "Sewer & Water").
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let key: String = raw
            .replace('&', " and ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .to_ascii_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == key)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a category name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown damage category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_lenient(s).ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Identifier of a neighborhood.
///
/// Source files mix numeric and string ids; both normalize to the trimmed
/// decimal text, so `5`, `"5"` and `5.0` are the same location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct LocationId(String);

impl<'de> Deserialize<'de> for LocationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid location id: {raw}")))
    }
}

impl LocationId {
    /// Creates an id from text, trimming whitespace and integral float suffixes.
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        let trimmed = raw.as_ref().trim();
        let id = trimmed
            .strip_suffix(".0")
            .filter(|head| !head.is_empty() && head.bytes().all(|b| b.is_ascii_digit()))
            .unwrap_or(trimmed);
        Self(id.to_string())
    }

    /// Creates an id from a JSON id field (number or string).
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(Self::new(s)),
            serde_json::Value::Number(n) => Some(n.as_i64().map_or_else(
                || Self::new(n.to_string()),
                |i| Self(i.to_string()),
            )),
            _ => None,
        }
    }

    /// The normalized id text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LocationId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<u32> for LocationId {
    fn from(id: u32) -> Self {
        Self(id.to_string())
    }
}
