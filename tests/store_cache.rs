use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use quakeview::store::NeighborhoodName;
use quakeview::{
    AggregatedPoint, BstsSummary, Category, DataStore, Dataset, DatasetSource, Geography,
    InMemorySource, LoadError, LocationId, RawReport, RequestGeneration,
};

fn at(h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 4, 8, h, 0, 0).unwrap()
}

fn summaries() -> Vec<BstsSummary> {
    (1..=19u32)
        .flat_map(|id| {
            Category::ALL.into_iter().map(move |cat| {
                BstsSummary::new(at(8), LocationId::from(id), cat, f64::from(id % 10)).with_cir(1.0)
            })
        })
        .collect()
}

/// Source whose BSTS load suspends, so concurrent callers overlap.
struct SlowSource {
    inner: InMemorySource,
    bsts_loads: AtomicUsize,
}

#[async_trait]
impl DatasetSource for SlowSource {
    async fn geography(&self) -> Result<Geography, LoadError> {
        self.inner.geography().await
    }

    async fn neighborhood_map(&self) -> Result<Vec<NeighborhoodName>, LoadError> {
        self.inner.neighborhood_map().await
    }

    async fn raw_reports(&self) -> Result<Vec<RawReport>, LoadError> {
        self.inner.raw_reports().await
    }

    async fn bsts_summaries(&self) -> Result<Vec<BstsSummary>, LoadError> {
        self.bsts_loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.inner.bsts_summaries().await
    }

    async fn aggregated_series(&self) -> Result<Vec<AggregatedPoint>, LoadError> {
        self.inner.aggregated_series().await
    }

    fn name(&self) -> &str {
        "slow"
    }
}

#[tokio::test]
async fn concurrent_identical_snapshots_share_one_reduction() {
    let source = Arc::new(SlowSource {
        inner: InMemorySource::new().with_bsts_summaries(summaries()),
        bsts_loads: AtomicUsize::new(0),
    });
    let store = DataStore::with_source(source.clone());

    let (a, b) = tokio::join!(
        store.bsts_snapshot(Some(Category::Power), Some(at(9))),
        store.bsts_snapshot(Some(Category::Power), Some(at(9))),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.location_count(), 19);

    let stats = store.stats();
    assert_eq!(stats.snapshot_computations, 1);
    assert_eq!(stats.dataset_loads, 1);
    assert_eq!(source.bsts_loads.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_snapshots_across_tasks() {
    let source = Arc::new(SlowSource {
        inner: InMemorySource::new().with_bsts_summaries(summaries()),
        bsts_loads: AtomicUsize::new(0),
    });
    let store = Arc::new(DataStore::with_source(source.clone()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            let category = if i % 2 == 0 { Some(Category::Power) } else { None };
            tokio::spawn(async move { store.bsts_snapshot(category, Some(at(9))).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stats = store.stats();
    assert_eq!(source.bsts_loads.load(Ordering::SeqCst), 1);
    assert_eq!(stats.snapshot_computations, 2);
    assert_eq!(store.cached_snapshots().unwrap(), 2);
}

#[tokio::test]
async fn neighborhood_map_failure_falls_back_to_builtin_names() {
    let store = DataStore::with_source(Arc::new(
        InMemorySource::new().failing(Dataset::NeighborhoodMap),
    ));
    let names = store.neighborhood_names().await;
    assert_eq!(names.len(), 19);
    assert_eq!(names[&LocationId::from(1)], "Palace Hills");
    assert_eq!(names[&LocationId::from(19)], "West Parton");
    assert_eq!(store.stats().load_failures, 1);
}

#[tokio::test]
async fn other_load_failures_are_typed_and_retried() {
    let source = Arc::new(InMemorySource::new().failing(Dataset::Geography));
    let store = DataStore::with_source(source.clone());

    let err = store.geography().await.unwrap_err();
    assert!(err.is_load());
    assert!(err.is_retryable());
    assert!(err.to_string().contains("geography"));

    assert!(store.locations().await.is_err());
    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test]
async fn datasets_load_once() {
    let source = Arc::new(InMemorySource::new().with_raw_reports(vec![RawReport::new(
        at(7),
        LocationId::from(1),
        Category::Power,
        2.0,
    )]));
    let store = DataStore::with_source(source.clone());
    for _ in 0..3 {
        store.raw_reports().await.unwrap();
        store.raw_reports_by_location(&LocationId::from(1)).await.unwrap();
    }
    assert_eq!(source.fetch_count(), 1);
    assert_eq!(store.stats().dataset_loads, 1);
}

#[tokio::test]
async fn superseded_results_are_discarded() {
    let store = Arc::new(DataStore::with_source(Arc::new(
        InMemorySource::new().with_bsts_summaries(summaries()),
    )));
    let generation = RequestGeneration::new();

    let first = generation.issue();
    let stale = store.bsts_snapshot(None, Some(at(8))).await.unwrap();
    let second = generation.issue();
    let fresh = store.bsts_snapshot(None, Some(at(9))).await.unwrap();

    assert!(generation.accept(first, stale).is_none());
    assert!(generation.accept(second, fresh).is_some());
}
