//! Raw report filtering.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::category::{Category, LocationId};
use crate::error::QuakeResult;
use crate::normalize::{reconcile_with, NormalizeParams};
use crate::record::RawReport;
use crate::store::DataStore;
use crate::time::TimeRange;

/// Certainty band a report must fall in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertaintyFilter {
    /// Below 0.2.
    VeryLow,
    /// From 0.2 up to 0.4.
    Low,
    /// From 0.4 up to 0.8.
    Medium,
    /// 0.8 and above.
    High,
}

impl CertaintyFilter {
    /// True when `certainty` falls in this band.
    #[must_use]
    pub fn contains(self, certainty: f64) -> bool {
        match self {
            Self::VeryLow => certainty < 0.2,
            Self::Low => (0.2..0.4).contains(&certainty),
            Self::Medium => (0.4..0.8).contains(&certainty),
            Self::High => certainty >= 0.8,
        }
    }
}

impl std::str::FromStr for CertaintyFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "very_low" => Ok(Self::VeryLow),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown certainty filter: {other}")),
        }
    }
}

/// Selection over raw reports. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportFilter {
    /// Empty means every category.
    pub categories: BTreeSet<Category>,
    /// Single neighborhood, if any.
    pub location: Option<LocationId>,
    /// Closed time window.
    pub range: TimeRange,
    /// Tested against the reconciled certainty of each report.
    pub certainty: Option<CertaintyFilter>,
}

impl ReportFilter {
    /// A filter that matches every report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a category to the set.
    #[must_use]
    pub fn category(mut self, category: Category) -> Self {
        self.categories.insert(category);
        self
    }

    /// Restricts to one neighborhood.
    #[must_use]
    pub fn location(mut self, location: impl Into<LocationId>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Restricts to a time window.
    #[must_use]
    pub const fn range(mut self, range: TimeRange) -> Self {
        self.range = range;
        self
    }

    /// Restricts to a certainty band.
    #[must_use]
    pub const fn certainty(mut self, band: CertaintyFilter) -> Self {
        self.certainty = Some(band);
        self
    }

    /// True if `report` passes every criterion.
    #[must_use]
    pub fn matches(&self, report: &RawReport, params: &NormalizeParams) -> bool {
        (self.categories.is_empty() || self.categories.contains(&report.category))
            && self.location.as_ref().map_or(true, |l| *l == report.location)
            && self.range.contains(report.time)
            && self
                .certainty
                .map_or(true, |band| band.contains(reconcile_with(report, params).estimate.certainty))
    }

    /// Matching reports, oldest first.
    #[must_use]
    pub fn apply<'a>(
        &self,
        reports: impl IntoIterator<Item = &'a RawReport>,
        params: &NormalizeParams,
    ) -> Vec<&'a RawReport> {
        let mut out: Vec<&RawReport> = reports
            .into_iter()
            .filter(|r| self.matches(r, params))
            .collect();
        out.sort_by_key(|r| r.time);
        out
    }
}

/// Raw reports passing `filter`, oldest first.
///
/// # Errors
///
/// Returns [`QuakeError::Load`](crate::QuakeError::Load) if the raw reports
/// cannot be loaded.
pub async fn filtered_reports(store: &DataStore, filter: &ReportFilter) -> QuakeResult<Vec<RawReport>> {
    let reports = store.raw_reports().await?;
    let params = store.normalize_params();
    let matched = match &filter.location {
        Some(location) => {
            let own = reports.for_location(location);
            filter.apply(own.iter(), &params).into_iter().cloned().collect()
        }
        None => filter.apply(reports.iter(), &params).into_iter().cloned().collect(),
    };
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 4, 8, h, 0, 0).unwrap()
    }

    fn reports() -> Vec<RawReport> {
        vec![
            RawReport::new(at(10), LocationId::from(1), Category::Power, 3.0).with_certainty(0.9),
            RawReport::new(at(8), LocationId::from(1), Category::Medical, 5.0).with_certainty_level("low"),
            RawReport::new(at(9), LocationId::from(2), Category::Power, 1.0),
            RawReport::new(at(12), LocationId::from(2), Category::Buildings, 7.0).with_cir(1.0),
        ]
    }

    #[test]
    fn test_empty_filter_matches_all_sorted() {
        let reports = reports();
        let out = ReportFilter::new().apply(&reports, &NormalizeParams::default());
        assert_eq!(out.len(), 4);
        assert!(out.windows(2).all(|w| w[0].time <= w[1].time));
    }

    #[test]
    fn test_filter_criteria_combine() {
        let reports = reports();
        let params = NormalizeParams::default();

        let power = ReportFilter::new().category(Category::Power).apply(&reports, &params);
        assert_eq!(power.len(), 2);

        let loc_two_power = ReportFilter::new()
            .category(Category::Power)
            .location(2u32)
            .apply(&reports, &params);
        assert_eq!(loc_two_power.len(), 1);

        let morning = ReportFilter::new()
            .range(TimeRange::new(at(8), at(9)))
            .apply(&reports, &params);
        assert_eq!(morning.len(), 2);

        let high = ReportFilter::new().certainty(CertaintyFilter::High).apply(&reports, &params);
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].category, Category::Power);

        // A bare report reconciles to the 0.2 fallback, which is "low".
        let low = ReportFilter::new().certainty(CertaintyFilter::Low).apply(&reports, &params);
        assert_eq!(low.len(), 2);
    }

    #[test]
    fn test_deserialized_filter_normalizes_location() {
        let reports = reports();
        let params = NormalizeParams::default();
        for raw in [r#"{"location": "2.0"}"#, r#"{"location": 2}"#] {
            let filter: ReportFilter = serde_json::from_str(raw).unwrap();
            assert_eq!(filter.apply(&reports, &params).len(), 2, "{raw}");
        }
    }

    #[test]
    fn test_certainty_filter_parse() {
        assert_eq!("very_low".parse::<CertaintyFilter>(), Ok(CertaintyFilter::VeryLow));
        assert_eq!(" High ".parse::<CertaintyFilter>(), Ok(CertaintyFilter::High));
        assert!("any".parse::<CertaintyFilter>().is_err());
        assert!(CertaintyFilter::Medium.contains(0.4));
        assert!(!CertaintyFilter::Medium.contains(0.8));
    }
}
