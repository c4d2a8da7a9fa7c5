//! Category comparison statistics.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::category::{Category, LocationId};
use crate::error::QuakeResult;
use crate::normalize::{reconcile_with, NormalizeParams, Reconciliation};
use crate::store::{BstsSnapshot, DataStore, RawReports};
use crate::time::TimeRange;
use crate::views::signal_mean_certainty;

/// Which records feed the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    /// Latest model summary per location at the query time.
    #[default]
    Model,
    /// Raw reports inside a window around the query time.
    RawReports,
}

/// Linearly interpolated percentile of ascending `sorted` values.
///
/// `p` is a fraction in `[0, 1]`. Returns `0.0` for an empty slice.
///
/// # Examples
///
/// ```
/// use quakeview::views::percentile;
///
/// assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0], 0.5), 2.5);
/// assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0], 0.25), 1.75);
/// ```
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let Some(last) = sorted.len().checked_sub(1) else {
        return 0.0;
    };
    #[allow(clippy::cast_precision_loss)]
    let pos = last as f64 * p.clamp(0.0, 1.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let base = pos.floor() as usize;
    let rest = pos - pos.floor();
    match sorted.get(base + 1) {
        Some(next) => sorted[base] + rest * (next - sorted[base]),
        None => sorted[base],
    }
}

/// Min, quartiles, max and count of a sample.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FiveNumberSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub count: usize,
}

impl FiveNumberSummary {
    /// Summarizes `values`; all zeros when empty. Non-finite values are dropped.
    #[must_use]
    pub fn of(values: impl IntoIterator<Item = f64>) -> Self {
        let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);
        let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
            return Self::default();
        };
        Self {
            min,
            q1: percentile(&sorted, 0.25),
            median: percentile(&sorted, 0.5),
            q3: percentile(&sorted, 0.75),
            max,
            count: sorted.len(),
        }
    }
}

/// Statistics for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    /// Category described.
    pub category: Category,
    /// Display label.
    pub label: &'static str,
    /// Distribution of per-location values.
    pub summary: FiveNumberSummary,
    /// Mean over records whose certainty came from a signal; zero if none.
    pub mean_certainty: f64,
}

impl CategoryStats {
    fn from_reconciled(category: Category, reconciled: &[Reconciliation]) -> Self {
        Self {
            category,
            label: category.label(),
            summary: FiveNumberSummary::of(reconciled.iter().map(|r| r.estimate.value)),
            mean_certainty: signal_mean_certainty(reconciled),
        }
    }
}

/// Statistics for every category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryComparison {
    /// Which records were compared.
    pub mode: ComparisonMode,
    /// Reference instant.
    pub time: DateTime<Utc>,
    /// Single-location filter, if any.
    pub location: Option<LocationId>,
    /// In [`Category::ALL`] order.
    pub categories: Vec<CategoryStats>,
}

impl CategoryComparison {
    /// Compares the latest model summaries of `summaries` (taken at `time`).
    #[must_use]
    pub fn from_model(
        time: DateTime<Utc>,
        summaries: &BstsSnapshot,
        location: Option<&LocationId>,
        params: &NormalizeParams,
    ) -> Self {
        let categories = Category::ALL
            .into_iter()
            .map(|category| {
                let reconciled: Vec<Reconciliation> = summaries
                    .iter()
                    .filter(|(loc, cat, _)| *cat == category && location.map_or(true, |l| l == *loc))
                    .map(|(_, _, summary)| reconcile_with(summary, params))
                    .collect();
                CategoryStats::from_reconciled(category, &reconciled)
            })
            .collect();
        Self {
            mode: ComparisonMode::Model,
            time,
            location: location.cloned(),
            categories,
        }
    }

    /// Compares raw reports within `time ± window`.
    #[must_use]
    pub fn from_raw(
        time: DateTime<Utc>,
        window: Duration,
        reports: &RawReports,
        location: Option<&LocationId>,
        params: &NormalizeParams,
    ) -> Self {
        let range = TimeRange::around(time, window);
        let categories = Category::ALL
            .into_iter()
            .map(|category| {
                let reconciled: Vec<Reconciliation> = reports
                    .iter()
                    .filter(|r| {
                        r.category == category
                            && range.contains(r.time)
                            && location.map_or(true, |l| *l == r.location)
                    })
                    .map(|r| reconcile_with(r, params))
                    .collect();
                CategoryStats::from_reconciled(category, &reconciled)
            })
            .collect();
        Self {
            mode: ComparisonMode::RawReports,
            time,
            location: location.cloned(),
            categories,
        }
    }

    /// The statistics for one category.
    #[must_use]
    pub fn category(&self, category: Category) -> Option<&CategoryStats> {
        self.categories.iter().find(|c| c.category == category)
    }
}

/// Category comparison at `time`, optionally for one location only.
///
/// Raw mode uses the store's configured window.
///
/// # Errors
///
/// Returns [`QuakeError::Load`](crate::QuakeError::Load) if the needed
/// dataset cannot be loaded.
pub async fn category_comparison(
    store: &DataStore,
    mode: ComparisonMode,
    time: DateTime<Utc>,
    location: Option<&LocationId>,
) -> QuakeResult<CategoryComparison> {
    let params = store.normalize_params();
    match mode {
        ComparisonMode::Model => {
            let summaries = store.bsts_snapshot(None, Some(time)).await?;
            Ok(CategoryComparison::from_model(time, &summaries, location, &params))
        }
        ComparisonMode::RawReports => {
            let reports = store.raw_reports().await?;
            let window = store.config().raw_window();
            Ok(CategoryComparison::from_raw(time, window, &reports, location, &params))
        }
    }
}
