//! Reliability insights over the model snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::category::{Category, LocationId};
use crate::certainty::CertaintyBand;
use crate::error::QuakeResult;
use crate::normalize::{reconcile_with, NormalizeParams, Reconciliation};
use crate::store::{BstsSnapshot, DataStore};
use crate::views::signal_mean_certainty;

/// Entries in each reliability ranking.
pub const RANKING_SIZE: usize = 5;

/// Certainty a neighborhood must exceed to rank as most reliable.
pub const RELIABLE_CERTAINTY: f64 = 0.85;

/// Highest reconciled value in the snapshot.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Peak {
    pub location: LocationId,
    pub name: String,
    pub category: Category,
    pub value: f64,
}

/// A neighborhood's certainty for the selected category.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReliabilityEntry {
    pub location: LocationId,
    pub name: String,
    pub certainty: f64,
}

/// Summary of where the data is strongest and weakest.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    /// Snapshot instant; `None` means latest.
    pub time: Option<DateTime<Utc>>,
    /// Category ranked.
    pub category: Category,
    /// `None` when the snapshot is empty.
    pub peak: Option<Peak>,
    /// Mean over signal-derived certainties; zero if none.
    pub average_certainty: f64,
    /// Signal-derived certainties per band.
    pub breakdown: BTreeMap<CertaintyBand, usize>,
    /// Up to five neighborhoods above [`RELIABLE_CERTAINTY`], most certain first.
    pub most_reliable: Vec<ReliabilityEntry>,
    /// The five least certain neighborhoods, least certain first.
    pub least_reliable: Vec<ReliabilityEntry>,
}

impl Insights {
    /// Builds insights from the all-category snapshot at `time`.
    #[must_use]
    pub fn build(
        time: Option<DateTime<Utc>>,
        category: Category,
        summaries: &BstsSnapshot,
        names: &BTreeMap<LocationId, String>,
        params: &NormalizeParams,
    ) -> Self {
        let name_of = |id: &LocationId| {
            names
                .get(id)
                .cloned()
                .unwrap_or_else(|| format!("Neighborhood {id}"))
        };

        let reconciled: Vec<(&LocationId, Category, Reconciliation)> = summaries
            .iter()
            .map(|(loc, cat, summary)| (loc, cat, reconcile_with(summary, params)))
            .collect();

        let peak = reconciled
            .iter()
            .fold(None::<&(&LocationId, Category, Reconciliation)>, |best, item| match best {
                Some(b) if b.2.estimate.value >= item.2.estimate.value => Some(b),
                _ => Some(item),
            })
            .map(|(loc, cat, r)| Peak {
                location: (*loc).clone(),
                name: name_of(*loc),
                category: *cat,
                value: r.estimate.value,
            });

        let mut breakdown: BTreeMap<CertaintyBand, usize> =
            [CertaintyBand::Low, CertaintyBand::Medium, CertaintyBand::High]
                .into_iter()
                .map(|band| (band, 0))
                .collect();
        for (_, _, r) in reconciled.iter().filter(|(_, _, r)| r.basis.is_signal()) {
            *breakdown.entry(CertaintyBand::of(r.estimate.certainty)).or_default() += 1;
        }

        let mut ranked: Vec<ReliabilityEntry> = reconciled
            .iter()
            .filter(|(_, cat, _)| *cat == category)
            .map(|(loc, _, r)| ReliabilityEntry {
                location: (*loc).clone(),
                name: name_of(*loc),
                certainty: r.estimate.certainty,
            })
            .collect();
        ranked.sort_by(|a, b| a.certainty.total_cmp(&b.certainty));

        let least_reliable = ranked.iter().take(RANKING_SIZE).cloned().collect();
        let most_reliable = ranked
            .iter()
            .rev()
            .filter(|e| e.certainty > RELIABLE_CERTAINTY)
            .take(RANKING_SIZE)
            .cloned()
            .collect();

        Self {
            time,
            category,
            peak,
            average_certainty: signal_mean_certainty(reconciled.iter().map(|(_, _, r)| r)),
            breakdown,
            most_reliable,
            least_reliable,
        }
    }
}

/// Insights at `time` with rankings for `category`.
///
/// # Errors
///
/// Returns [`QuakeError::Load`](crate::QuakeError::Load) if the summaries
/// cannot be loaded.
pub async fn insights(
    store: &DataStore,
    category: Category,
    time: Option<DateTime<Utc>>,
) -> QuakeResult<Insights> {
    let summaries = store.bsts_snapshot(None, time).await?;
    let names = store.neighborhood_names().await;
    Ok(Insights::build(
        time,
        category,
        &summaries,
        &names,
        &store.normalize_params(),
    ))
}
