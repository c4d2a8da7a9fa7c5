//! Forecast window for one (location, category).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::category::{Category, LocationId};
use crate::certainty::{certainty_from_cir, ci_from_value_and_cir, SCALE_MAX, SCALE_MIN};
use crate::error::QuakeResult;
use crate::record::AggregatedPoint;
use crate::store::DataStore;
use crate::time::TimeRange;

/// One forecast point with its credible interval.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPoint {
    pub time: DateTime<Utc>,
    pub value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub certainty: f64,
}

impl ForecastPoint {
    /// Interval from the point's own CIR. Missing MAP or CIR count as zero.
    #[must_use]
    pub fn from_aggregated(point: &AggregatedPoint, max_credible_cir: f64) -> Self {
        let value = point.map.value().unwrap_or(0.0).clamp(SCALE_MIN, SCALE_MAX);
        let cir = point.cir.value().unwrap_or(0.0);
        let interval = ci_from_value_and_cir(value, cir, SCALE_MIN, SCALE_MAX);
        Self {
            time: point.time,
            value,
            ci_lower: interval.lower,
            ci_upper: interval.upper,
            certainty: certainty_from_cir(cir, max_credible_cir),
        }
    }

    /// Converts a time-sorted series, keeping points inside `range`.
    #[must_use]
    pub fn series(points: &[AggregatedPoint], range: &TimeRange, max_credible_cir: f64) -> Vec<Self> {
        points
            .iter()
            .filter(|p| range.contains(p.time))
            .map(|p| Self::from_aggregated(p, max_credible_cir))
            .collect()
    }
}

/// Time-ordered forecast for `(location, category)`, optionally limited to
/// `range`.
///
/// # Errors
///
/// Returns [`QuakeError::Load`](crate::QuakeError::Load) if the aggregated
/// series cannot be loaded.
pub async fn forecast_window(
    store: &DataStore,
    location: &LocationId,
    category: Category,
    range: Option<&TimeRange>,
) -> QuakeResult<Vec<ForecastPoint>> {
    let index = store.aggregated_index().await?;
    let all = TimeRange::all();
    Ok(ForecastPoint::series(
        index.bucket(location, category),
        range.unwrap_or(&all),
        store.config().max_credible_cir,
    ))
}
