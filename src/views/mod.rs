//! Aggregation views.
//!
//! Each view is a synchronous reduction over data already held by the
//! [`DataStore`](crate::DataStore), plus an async entry point that fetches
//! what it needs from the store first. Views take every selection as an
//! explicit parameter and share the normalizer's priority order, so one
//! (location, category, time) reconciles to the same estimate everywhere.

mod comparison;
mod filter;
mod forecast;
mod insights;
mod map;
mod neighborhood;

pub use comparison::{
    category_comparison, percentile, CategoryComparison, CategoryStats, ComparisonMode,
    FiveNumberSummary,
};
pub use filter::{filtered_reports, CertaintyFilter, ReportFilter};
pub use forecast::{forecast_window, ForecastPoint};
pub use insights::{insights, Insights, Peak, ReliabilityEntry};
pub use map::{map_view, MapEntry, MapView};
pub use neighborhood::{neighborhood_snapshot, CategoryEstimate, NeighborhoodSnapshot};

use crate::normalize::{reconcile_with, NormalizeParams, Reconciliation};
use crate::record::{BstsSummary, RawReport};

/// Model summary first, then the latest raw report, then no data.
pub(crate) fn preferred(
    summary: Option<&BstsSummary>,
    report: Option<&RawReport>,
    params: &NormalizeParams,
) -> Reconciliation {
    match (summary, report) {
        (Some(summary), _) => reconcile_with(summary, params),
        (None, Some(report)) => reconcile_with(report, params),
        (None, None) => Reconciliation::no_data(),
    }
}

/// Mean certainty over reconciliations whose certainty came from a signal.
/// Zero when none did.
pub(crate) fn signal_mean_certainty<'a>(items: impl IntoIterator<Item = &'a Reconciliation>) -> f64 {
    let (sum, n) = items
        .into_iter()
        .filter(|r| r.basis.is_signal())
        .fold((0.0, 0usize), |(sum, n), r| (sum + r.estimate.certainty, n + 1));
    if n == 0 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let n = n as f64;
        sum / n
    }
}
