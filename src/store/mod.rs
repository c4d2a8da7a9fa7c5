//! Data access and cache layer.
//!
//! [`DataStore`] owns every dataset and derived index for the lifetime of a
//! session. Each dataset is fetched from the injected [`DatasetSource`] at
//! most once; concurrent first requests share one in-flight load. BSTS
//! snapshots are memoized per `(category, time)` and concurrent identical
//! requests share a single bulk reduction.
//!
//! Failed loads are not cached, so a later call retries the source. The one
//! dataset that degrades instead of failing is the neighborhood name table,
//! which falls back to a built-in list.

mod config;
mod file;
mod generation;
mod geography;
mod memory;
mod source;

pub use config::{DatasetFiles, StoreConfig, MAX_RAW_WINDOW_HOURS};
pub use file::{
    parse_aggregated_csv, parse_bsts_json, parse_raw_reports_csv, parse_raw_reports_json,
    FileSource, Parsed,
};
pub use generation::{RequestGeneration, Ticket};
pub use geography::{
    fallback_neighborhood_names, parse_neighborhood_map, Geography, NeighborhoodName,
    NeighborhoodShape, FALLBACK_NEIGHBORHOOD_NAMES,
};
pub use memory::InMemorySource;
pub use source::DatasetSource;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::category::{Category, LocationId};
use crate::error::{Dataset, LoadError, QuakeError, QuakeResult};
use crate::normalize::NormalizeParams;
use crate::record::{AggregatedPoint, BstsSummary, RawReport};
use crate::temporal::TemporalIndex;

fn lock_err(context: &'static str) -> QuakeError {
    QuakeError::internal(format!("poisoned lock: {context}"))
}

/// Raw reports indexed by location and by (location, category).
#[derive(Debug, Default)]
pub struct RawReports {
    index: TemporalIndex<RawReport>,
    by_location: HashMap<LocationId, Arc<[RawReport]>>,
}

impl RawReports {
    /// Indexes reports; each location's list is sorted by time.
    #[must_use]
    pub fn build(reports: Vec<RawReport>) -> Self {
        let mut grouped: HashMap<LocationId, Vec<RawReport>> = HashMap::new();
        for report in &reports {
            grouped
                .entry(report.location.clone())
                .or_default()
                .push(report.clone());
        }
        let by_location = grouped
            .into_iter()
            .map(|(id, mut list)| {
                list.sort_by_key(|r| r.time);
                (id, Arc::from(list))
            })
            .collect();
        Self {
            index: TemporalIndex::build(reports),
            by_location,
        }
    }

    /// The (location, category) index.
    #[must_use]
    pub const fn index(&self) -> &TemporalIndex<RawReport> {
        &self.index
    }

    /// Reports for one location, oldest first. Empty when unknown.
    #[must_use]
    pub fn for_location(&self, location: &LocationId) -> Arc<[RawReport]> {
        self.by_location
            .get(location)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// Every report, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &RawReport> {
        self.index.iter()
    }

    /// Number of raw reports.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.index.len()
    }

    /// True when no reports were loaded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of reports for a (location, category) at or before `time`.
    #[must_use]
    pub fn count_as_of(&self, location: &LocationId, category: Category, time: DateTime<Utc>) -> usize {
        self.index
            .bucket(location, category)
            .partition_point(|r| r.time <= time)
    }
}

/// Latest BSTS summary per location and category at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BstsSnapshot {
    /// Category filter; `None` covers all.
    pub category: Option<Category>,
    /// `None` means the latest record overall.
    pub time: Option<DateTime<Utc>>,
    entries: BTreeMap<LocationId, BTreeMap<Category, BstsSummary>>,
}

impl BstsSnapshot {
    /// Reduces an index to a snapshot.
    #[must_use]
    pub fn compute(
        index: &TemporalIndex<BstsSummary>,
        category: Option<Category>,
        time: Option<DateTime<Utc>>,
    ) -> Self {
        let entries = index
            .snapshot(category, time)
            .into_iter()
            .map(|(location, by_cat)| {
                let owned = by_cat.into_iter().map(|(c, r)| (c, r.clone())).collect();
                (location, owned)
            })
            .collect();
        Self {
            category,
            time,
            entries,
        }
    }

    /// Summary for one location and category.
    #[must_use]
    pub fn get(&self, location: &LocationId, category: Category) -> Option<&BstsSummary> {
        self.entries.get(location).and_then(|m| m.get(&category))
    }

    /// Summaries for one location, keyed by category.
    #[must_use]
    pub fn for_location(&self, location: &LocationId) -> Option<&BTreeMap<Category, BstsSummary>> {
        self.entries.get(location)
    }

    /// Iterates over `(location, category, summary)`.
    pub fn iter(&self) -> impl Iterator<Item = (&LocationId, Category, &BstsSummary)> {
        self.entries
            .iter()
            .flat_map(|(loc, m)| m.iter().map(move |(c, r)| (loc, *c, r)))
    }

    /// Number of locations with at least one summary.
    #[must_use]
    pub fn location_count(&self) -> usize {
        self.entries.len()
    }

    /// True when no location has a summary.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

type SnapshotKey = (Option<Category>, Option<DateTime<Utc>>);
type SnapshotCell = Arc<OnceCell<Arc<BstsSnapshot>>>;

/// Load and cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Successful dataset loads.
    pub dataset_loads: usize,
    /// Failed dataset loads (neighborhood map fallbacks included).
    pub load_failures: usize,
    /// Bulk snapshot reductions actually performed.
    pub snapshot_computations: usize,
    /// Snapshot requests served from the cache.
    pub snapshot_hits: usize,
}

#[derive(Debug, Default)]
struct Counters {
    dataset_loads: AtomicUsize,
    load_failures: AtomicUsize,
    snapshot_computations: AtomicUsize,
    snapshot_hits: AtomicUsize,
}

/// Session-lifetime owner of all datasets and indices.
pub struct DataStore {
    source: Arc<dyn DatasetSource>,
    config: StoreConfig,
    geography: OnceCell<Arc<Geography>>,
    names: OnceCell<Arc<BTreeMap<LocationId, String>>>,
    raw_reports: OnceCell<Arc<RawReports>>,
    bsts: OnceCell<Arc<TemporalIndex<BstsSummary>>>,
    aggregated: OnceCell<Arc<TemporalIndex<AggregatedPoint>>>,
    snapshots: Mutex<HashMap<SnapshotKey, SnapshotCell>>,
    counters: Counters,
}

impl std::fmt::Debug for DataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStore")
            .field("source", &self.source.name())
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl DataStore {
    /// Creates a store over `source` with the given configuration.
    #[must_use]
    pub fn new(source: Arc<dyn DatasetSource>, config: StoreConfig) -> Self {
        Self {
            source,
            config,
            geography: OnceCell::new(),
            names: OnceCell::new(),
            raw_reports: OnceCell::new(),
            bsts: OnceCell::new(),
            aggregated: OnceCell::new(),
            snapshots: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// Creates a store over `source` with the default configuration.
    #[must_use]
    pub fn with_source(source: Arc<dyn DatasetSource>) -> Self {
        Self::new(source, StoreConfig::default())
    }

    /// Creates a file-backed store reading from `config.data_dir`.
    #[must_use]
    pub fn from_config(config: StoreConfig) -> Self {
        let source = Arc::new(FileSource::new(config.clone()));
        Self::new(source, config)
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Scale constants for normalizing records from this store.
    #[must_use]
    pub const fn normalize_params(&self) -> NormalizeParams {
        self.config.normalize_params()
    }

    /// Snapshot of the load and cache counters.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let c = &self.counters;
        StoreStats {
            dataset_loads: c.dataset_loads.load(Ordering::Relaxed),
            load_failures: c.load_failures.load(Ordering::Relaxed),
            snapshot_computations: c.snapshot_computations.load(Ordering::Relaxed),
            snapshot_hits: c.snapshot_hits.load(Ordering::Relaxed),
        }
    }

    fn loaded(&self, dataset: Dataset, rows: usize) {
        self.counters.dataset_loads.fetch_add(1, Ordering::Relaxed);
        info!(dataset = dataset.as_str(), rows, source = self.source.name(), "dataset loaded");
    }

    fn failed(&self, err: &LoadError) {
        self.counters.load_failures.fetch_add(1, Ordering::Relaxed);
        warn!(dataset = err.dataset().as_str(), error = %err, "dataset load failed");
    }

    /// Neighborhood polygons.
    ///
    /// # Errors
    ///
    /// Returns [`QuakeError::Load`] if the source fails.
    pub async fn geography(&self) -> QuakeResult<Arc<Geography>> {
        let geography = self
            .geography
            .get_or_try_init(|| async {
                match self.source.geography().await {
                    Ok(geo) => {
                        self.loaded(Dataset::Geography, geo.len());
                        Ok(Arc::new(geo))
                    }
                    Err(err) => {
                        self.failed(&err);
                        Err(err)
                    }
                }
            })
            .await?;
        Ok(Arc::clone(geography))
    }

    /// Neighborhood id to name table.
    ///
    /// Never fails: if the table cannot be loaded, the built-in names are
    /// used for the rest of the session.
    pub async fn neighborhood_names(&self) -> Arc<BTreeMap<LocationId, String>> {
        let names = self
            .names
            .get_or_init(|| async {
                match self.source.neighborhood_map().await {
                    Ok(rows) => {
                        self.loaded(Dataset::NeighborhoodMap, rows.len());
                        Arc::new(rows.into_iter().map(|r| (r.id, r.name)).collect())
                    }
                    Err(err) => {
                        self.failed(&err);
                        warn!("using built-in neighborhood names");
                        Arc::new(fallback_neighborhood_names())
                    }
                }
            })
            .await;
        Arc::clone(names)
    }

    /// Display name of a neighborhood.
    pub async fn neighborhood_name(&self, location: &LocationId) -> String {
        self.neighborhood_names()
            .await
            .get(location)
            .cloned()
            .unwrap_or_else(|| format!("Neighborhood {location}"))
    }

    /// Indexed raw reports.
    ///
    /// # Errors
    ///
    /// Returns [`QuakeError::Load`] if the source fails.
    pub async fn raw_reports(&self) -> QuakeResult<Arc<RawReports>> {
        let reports = self
            .raw_reports
            .get_or_try_init(|| async {
                match self.source.raw_reports().await {
                    Ok(rows) => {
                        self.loaded(Dataset::RawReports, rows.len());
                        Ok(Arc::new(RawReports::build(rows)))
                    }
                    Err(err) => {
                        self.failed(&err);
                        Err(err)
                    }
                }
            })
            .await?;
        Ok(Arc::clone(reports))
    }

    /// Raw reports for one location, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`QuakeError::Load`] if the source fails.
    pub async fn raw_reports_by_location(&self, location: &LocationId) -> QuakeResult<Arc<[RawReport]>> {
        Ok(self.raw_reports().await?.for_location(location))
    }

    /// BSTS summaries indexed by (location, category).
    ///
    /// # Errors
    ///
    /// Returns [`QuakeError::Load`] if the source fails.
    pub async fn bsts_index(&self) -> QuakeResult<Arc<TemporalIndex<BstsSummary>>> {
        let index = self
            .bsts
            .get_or_try_init(|| async {
                match self.source.bsts_summaries().await {
                    Ok(rows) => {
                        self.loaded(Dataset::BstsSummaries, rows.len());
                        Ok(Arc::new(TemporalIndex::build(rows)))
                    }
                    Err(err) => {
                        self.failed(&err);
                        Err(err)
                    }
                }
            })
            .await?;
        Ok(Arc::clone(index))
    }

    /// Aggregated forecast points indexed by (location, category).
    ///
    /// # Errors
    ///
    /// Returns [`QuakeError::Load`] if the source fails.
    pub async fn aggregated_index(&self) -> QuakeResult<Arc<TemporalIndex<AggregatedPoint>>> {
        let index = self
            .aggregated
            .get_or_try_init(|| async {
                match self.source.aggregated_series().await {
                    Ok(rows) => {
                        self.loaded(Dataset::AggregatedSeries, rows.len());
                        Ok(Arc::new(TemporalIndex::build(rows)))
                    }
                    Err(err) => {
                        self.failed(&err);
                        Err(err)
                    }
                }
            })
            .await?;
        Ok(Arc::clone(index))
    }

    /// Aggregated forecast points for a (location, category), oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`QuakeError::Load`] if the source fails.
    pub async fn aggregated_time_series(
        &self,
        location: &LocationId,
        category: Category,
    ) -> QuakeResult<Vec<AggregatedPoint>> {
        Ok(self.aggregated_index().await?.bucket(location, category).to_vec())
    }

    /// Location ids of the geography, in source order.
    ///
    /// # Errors
    ///
    /// Returns [`QuakeError::Load`] if the geography cannot be loaded.
    pub async fn locations(&self) -> QuakeResult<Vec<LocationId>> {
        Ok(self
            .geography()
            .await?
            .features()
            .iter()
            .map(|f| f.id.clone())
            .collect())
    }

    /// Latest BSTS summary per (location, category) at `time`.
    ///
    /// `category = None` covers all categories; `time = None` takes the
    /// latest record overall. Results are memoized per key, and concurrent
    /// requests for the same key share one reduction.
    ///
    /// # Errors
    ///
    /// Returns [`QuakeError::Load`] if the summaries cannot be loaded, or
    /// [`QuakeError::Internal`] if the cache lock is poisoned.
    pub async fn bsts_snapshot(
        &self,
        category: Option<Category>,
        time: Option<DateTime<Utc>>,
    ) -> QuakeResult<Arc<BstsSnapshot>> {
        let cell: SnapshotCell = {
            let mut cache = self
                .snapshots
                .lock()
                .map_err(|_| lock_err("snapshot cache"))?;
            Arc::clone(cache.entry((category, time)).or_default())
        };

        if let Some(hit) = cell.get() {
            self.counters.snapshot_hits.fetch_add(1, Ordering::Relaxed);
            debug!(?category, ?time, "snapshot cache hit");
            return Ok(Arc::clone(hit));
        }

        let snapshot = cell
            .get_or_try_init(|| async {
                let index = self.bsts_index().await?;
                self.counters
                    .snapshot_computations
                    .fetch_add(1, Ordering::Relaxed);
                let snapshot = BstsSnapshot::compute(&index, category, time);
                debug!(
                    ?category,
                    ?time,
                    locations = snapshot.location_count(),
                    "snapshot computed"
                );
                Ok::<_, QuakeError>(Arc::new(snapshot))
            })
            .await?;
        Ok(Arc::clone(snapshot))
    }

    /// Number of memoized snapshot keys.
    ///
    /// # Errors
    ///
    /// Returns [`QuakeError::Internal`] if the cache lock is poisoned.
    pub fn cached_snapshots(&self) -> QuakeResult<usize> {
        let cache = self
            .snapshots
            .lock()
            .map_err(|_| lock_err("snapshot cache"))?;
        Ok(cache.values().filter(|cell| cell.initialized()).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 4, 8, h, 0, 0).unwrap()
    }

    fn store_with(source: InMemorySource) -> DataStore {
        DataStore::with_source(Arc::new(source))
    }

    fn summaries() -> Vec<BstsSummary> {
        vec![
            BstsSummary::new(at(8), LocationId::from(1), Category::Power, 2.0),
            BstsSummary::new(at(10), LocationId::from(1), Category::Power, 3.0),
            BstsSummary::new(at(9), LocationId::from(2), Category::Medical, 4.0),
        ]
    }

    #[tokio::test]
    async fn test_snapshot_is_memoized() {
        let store = store_with(InMemorySource::new().with_bsts_summaries(summaries()));
        let first = store.bsts_snapshot(Some(Category::Power), Some(at(9))).await.unwrap();
        let second = store.bsts_snapshot(Some(Category::Power), Some(at(9))).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = store.stats();
        assert_eq!(stats.snapshot_computations, 1);
        assert_eq!(stats.snapshot_hits, 1);
        assert_eq!(stats.dataset_loads, 1);
        assert_eq!(store.cached_snapshots().unwrap(), 1);

        let power = first.get(&LocationId::from(1), Category::Power).unwrap();
        assert_eq!(power.time, at(8));
        assert!(first.get(&LocationId::from(2), Category::Medical).is_none());
    }

    #[tokio::test]
    async fn test_snapshot_without_time_is_latest_overall() {
        let store = store_with(InMemorySource::new().with_bsts_summaries(summaries()));
        let snap = store.bsts_snapshot(None, None).await.unwrap();
        assert_eq!(snap.get(&LocationId::from(1), Category::Power).unwrap().time, at(10));
        assert_eq!(snap.iter().count(), 2);
        assert_eq!(snap.location_count(), 2);
    }

    #[tokio::test]
    async fn test_distinct_keys_compute_separately() {
        let store = store_with(InMemorySource::new().with_bsts_summaries(summaries()));
        store.bsts_snapshot(Some(Category::Power), Some(at(9))).await.unwrap();
        store.bsts_snapshot(Some(Category::Power), Some(at(10))).await.unwrap();
        store.bsts_snapshot(None, Some(at(9))).await.unwrap();
        assert_eq!(store.stats().snapshot_computations, 3);
        assert_eq!(store.stats().dataset_loads, 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let source = Arc::new(InMemorySource::new().failing(Dataset::BstsSummaries));
        let store = DataStore::with_source(source.clone());
        let err = store.bsts_snapshot(None, None).await.unwrap_err();
        assert!(err.is_load());
        assert!(err.is_retryable());
        assert!(store.bsts_snapshot(None, None).await.is_err());
        assert_eq!(source.fetch_count(), 2);
        assert_eq!(store.stats().load_failures, 2);
        assert_eq!(store.cached_snapshots().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_neighborhood_names_fallback() {
        let store = store_with(InMemorySource::new().failing(Dataset::NeighborhoodMap));
        let names = store.neighborhood_names().await;
        assert_eq!(names.len(), 19);
        assert_eq!(store.neighborhood_name(&LocationId::from(3)).await, "Old Town");
        assert_eq!(store.neighborhood_name(&LocationId::from(42)).await, "Neighborhood 42");
    }

    #[tokio::test]
    async fn test_raw_reports_by_location_sorted() {
        let reports = vec![
            RawReport::new(at(12), LocationId::from(1), Category::Power, 3.0),
            RawReport::new(at(9), LocationId::from(1), Category::Medical, 1.0),
            RawReport::new(at(10), LocationId::from(2), Category::Power, 2.0),
        ];
        let store = store_with(InMemorySource::new().with_raw_reports(reports));
        let one = store.raw_reports_by_location(&LocationId::from(1)).await.unwrap();
        assert_eq!(one.len(), 2);
        assert_eq!(one[0].time, at(9));
        assert!(store
            .raw_reports_by_location(&LocationId::from(9))
            .await
            .unwrap()
            .is_empty());

        let all = store.raw_reports().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all.count_as_of(&LocationId::from(1), Category::Power, at(11)), 0);
        assert_eq!(all.count_as_of(&LocationId::from(1), Category::Power, at(12)), 1);
    }

    #[tokio::test]
    async fn test_aggregated_time_series_sorted() {
        let point = |h: u32, map: f64| AggregatedPoint {
            time: at(h),
            location: LocationId::from(4),
            category: Category::Buildings,
            map: map.into(),
            cir: 1.0.into(),
        };
        let store = store_with(
            InMemorySource::new().with_aggregated_series(vec![point(11, 2.0), point(9, 1.0)]),
        );
        let series = store
            .aggregated_time_series(&LocationId::from(4), Category::Buildings)
            .await
            .unwrap();
        assert_eq!(series.iter().map(|p| p.time).collect::<Vec<_>>(), vec![at(9), at(11)]);
    }
}
