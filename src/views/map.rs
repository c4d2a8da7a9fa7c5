//! All neighborhoods for one category.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::category::{Category, LocationId};
use crate::error::QuakeResult;
use crate::estimate::DamageEstimate;
use crate::normalize::{CertaintyBasis, NormalizeParams, RecordKind};
use crate::store::{BstsSnapshot, DataStore, Geography, RawReports};
use crate::views::preferred;

/// One map feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapEntry {
    /// Feature id.
    pub location: LocationId,
    /// Display name.
    pub name: String,
    /// Centroid as `[lon, lat]`.
    pub centroid: Option<[f64; 2]>,
    /// Reconciled estimate, or the no-data sentinel.
    pub estimate: DamageEstimate,
    /// Rule that set the certainty.
    pub basis: CertaintyBasis,
    /// Record kind used; `None` for no data.
    pub source: Option<RecordKind>,
}

/// Estimates for every geography feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    /// Category shown.
    pub category: Category,
    /// `None` means the latest data overall.
    pub time: Option<DateTime<Utc>>,
    /// One entry per feature, in geography order.
    pub entries: Vec<MapEntry>,
}

impl MapView {
    /// Builds the view. Features without data get the no-data sentinel.
    ///
    /// `summaries` must be the snapshot for `category` at `time`.
    #[must_use]
    pub fn build(
        category: Category,
        time: Option<DateTime<Utc>>,
        geography: &Geography,
        names: &BTreeMap<LocationId, String>,
        summaries: &BstsSnapshot,
        reports: &RawReports,
        params: &NormalizeParams,
    ) -> Self {
        let entries = geography
            .features()
            .iter()
            .map(|feature| {
                let id = &feature.id;
                let latest = match time {
                    Some(t) => reports.index().latest_as_of(id, category, t),
                    None => reports.index().latest(id, category),
                };
                let count = match time {
                    Some(t) => reports.count_as_of(id, category, t),
                    None => reports.index().bucket(id, category).len(),
                };
                let reconciled = preferred(summaries.get(id, category), latest, params);
                MapEntry {
                    location: id.clone(),
                    name: names.get(id).cloned().unwrap_or_else(|| feature.name.clone()),
                    centroid: feature.centroid,
                    estimate: reconciled.estimate.with_report_count(count),
                    basis: reconciled.basis,
                    source: reconciled.kind,
                }
            })
            .collect();
        Self {
            category,
            time,
            entries,
        }
    }

    /// The entry for one location.
    #[must_use]
    pub fn get(&self, location: &LocationId) -> Option<&MapEntry> {
        self.entries.iter().find(|e| &e.location == location)
    }

    /// Entries that have any data.
    pub fn with_data(&self) -> impl Iterator<Item = &MapEntry> {
        self.entries.iter().filter(|e| e.source.is_some())
    }
}

/// Map view for `category` at `time`.
///
/// # Errors
///
/// Returns [`QuakeError::Load`](crate::QuakeError::Load) if the geography,
/// summaries or raw reports cannot be loaded.
pub async fn map_view(
    store: &DataStore,
    category: Category,
    time: Option<DateTime<Utc>>,
) -> QuakeResult<MapView> {
    let geography = store.geography().await?;
    let summaries = store.bsts_snapshot(Some(category), time).await?;
    let reports = store.raw_reports().await?;
    let names = store.neighborhood_names().await;
    Ok(MapView::build(
        category,
        time,
        &geography,
        &names,
        &summaries,
        &reports,
        &store.normalize_params(),
    ))
}
