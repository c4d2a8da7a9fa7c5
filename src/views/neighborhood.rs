//! Single-neighborhood snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::category::{Category, LocationId};
use crate::error::QuakeResult;
use crate::estimate::{overall_status, DamageEstimate};
use crate::normalize::{CertaintyBasis, NormalizeParams, RecordKind};
use crate::store::{BstsSnapshot, DataStore, RawReports};
use crate::views::preferred;

/// One category of a neighborhood snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryEstimate {
    /// Category described.
    pub category: Category,
    /// Display label.
    pub label: &'static str,
    /// `report_count` holds the raw reports at or before the snapshot time.
    pub estimate: DamageEstimate,
    /// Rule that set the certainty.
    pub basis: CertaintyBasis,
    /// Record kind the estimate came from; `None` for no data.
    pub source: Option<RecordKind>,
    /// Time of the latest raw report at or before the snapshot time.
    pub latest_report: Option<DateTime<Utc>>,
}

/// Every category of one neighborhood at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodSnapshot {
    /// Neighborhood id.
    pub location: LocationId,
    /// Display name.
    pub name: String,
    /// Snapshot instant.
    pub time: DateTime<Utc>,
    /// In [`Category::ALL`] order.
    pub categories: Vec<CategoryEstimate>,
    /// Raw reports at or before `time`, all categories.
    pub report_count: usize,
    /// Mean value over categories that have data; zero if none do.
    pub average_damage: f64,
    /// Overall impact label for `average_damage`.
    pub status: &'static str,
}

impl NeighborhoodSnapshot {
    /// Reduces already-loaded data to a snapshot.
    ///
    /// `summaries` must be the all-category snapshot at `time`.
    #[must_use]
    pub fn build(
        location: LocationId,
        name: String,
        time: DateTime<Utc>,
        summaries: &BstsSnapshot,
        reports: &RawReports,
        params: &NormalizeParams,
    ) -> Self {
        let categories: Vec<CategoryEstimate> = Category::ALL
            .into_iter()
            .map(|category| {
                let latest = reports.index().latest_as_of(&location, category, time);
                let reconciled = preferred(summaries.get(&location, category), latest, params);
                CategoryEstimate {
                    category,
                    label: category.label(),
                    estimate: reconciled
                        .estimate
                        .with_report_count(reports.count_as_of(&location, category, time)),
                    basis: reconciled.basis,
                    source: reconciled.kind,
                    latest_report: latest.map(|r| r.time),
                }
            })
            .collect();

        let report_count = categories.iter().map(|c| c.estimate.report_count).sum();
        let with_data: Vec<f64> = categories
            .iter()
            .filter(|c| c.source.is_some())
            .map(|c| c.estimate.value)
            .collect();
        let average_damage = if with_data.is_empty() {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let n = with_data.len() as f64;
            with_data.iter().sum::<f64>() / n
        };

        Self {
            location,
            name,
            time,
            categories,
            report_count,
            average_damage,
            status: overall_status(average_damage),
        }
    }

    /// The entry for one category.
    #[must_use]
    pub fn category(&self, category: Category) -> Option<&CategoryEstimate> {
        self.categories.iter().find(|c| c.category == category)
    }
}

/// Snapshot of one neighborhood at `time`, model summaries preferred over
/// raw reports.
///
/// # Errors
///
/// Returns [`QuakeError::Load`](crate::QuakeError::Load) if the summaries or
/// raw reports cannot be loaded.
pub async fn neighborhood_snapshot(
    store: &DataStore,
    location: &LocationId,
    time: DateTime<Utc>,
) -> QuakeResult<NeighborhoodSnapshot> {
    let summaries = store.bsts_snapshot(None, Some(time)).await?;
    let reports = store.raw_reports().await?;
    let name = store.neighborhood_name(location).await;
    Ok(NeighborhoodSnapshot::build(
        location.clone(),
        name,
        time,
        &summaries,
        &reports,
        &store.normalize_params(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{BstsSummary, RawReport};
    use crate::temporal::TemporalIndex;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 4, 8, h, 0, 0).unwrap()
    }

    fn fixture() -> (BstsSnapshot, RawReports) {
        let loc = LocationId::from(5);
        let summaries = TemporalIndex::build(vec![
            BstsSummary::new(at(8), loc.clone(), Category::Buildings, 6.2).with_cir(1.5),
            BstsSummary::new(at(12), loc.clone(), Category::Buildings, 9.0).with_cir(1.0),
        ]);
        let reports = RawReports::build(vec![
            RawReport::new(at(7), loc.clone(), Category::Buildings, 4.0).with_certainty(0.6),
            RawReport::new(at(6), loc.clone(), Category::Power, 2.0),
            RawReport::new(at(8), loc.clone(), Category::Power, 3.0).with_certainty_level("high"),
            RawReport::new(at(11), loc, Category::Power, 8.0),
        ]);
        (BstsSnapshot::compute(&summaries, None, Some(at(9))), reports)
    }

    #[test]
    fn test_snapshot_prefers_model_and_counts_reports() {
        let (summaries, reports) = fixture();
        let snap = NeighborhoodSnapshot::build(
            LocationId::from(5),
            "Downtown".to_string(),
            at(9),
            &summaries,
            &reports,
            &NormalizeParams::default(),
        );
        assert_eq!(snap.categories.len(), 6);

        let buildings = snap.category(Category::Buildings).unwrap();
        assert_eq!(buildings.source, Some(RecordKind::Model));
        assert!((buildings.estimate.value - 6.2).abs() < 1e-9);
        assert_eq!(buildings.estimate.report_count, 1);
        assert_eq!(buildings.latest_report, Some(at(7)));

        let power = snap.category(Category::Power).unwrap();
        assert_eq!(power.source, Some(RecordKind::Raw));
        assert!((power.estimate.value - 3.0).abs() < 1e-9);
        assert!((power.estimate.certainty - 0.8).abs() < 1e-9);
        assert_eq!(power.estimate.report_count, 2);

        let medical = snap.category(Category::Medical).unwrap();
        assert!(medical.estimate.is_no_data());
        assert_eq!(medical.basis, CertaintyBasis::NoData);

        assert_eq!(snap.report_count, 3);
        assert!((snap.average_damage - 4.6).abs() < 1e-9);
        assert_eq!(snap.status, overall_status(4.6));
    }

    #[test]
    fn test_snapshot_without_data_is_all_sentinels() {
        let snap = NeighborhoodSnapshot::build(
            LocationId::from(9),
            "Neighborhood 9".to_string(),
            at(9),
            &BstsSnapshot::default(),
            &RawReports::default(),
            &NormalizeParams::default(),
        );
        assert!(snap.categories.iter().all(|c| c.estimate.is_no_data()));
        assert_eq!(snap.report_count, 0);
        assert!(snap.average_damage.abs() < f64::EPSILON);
    }
}
