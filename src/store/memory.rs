//! In-memory dataset source.
//!
//! Serves fixture data and can be told to fail individual datasets, which
//! makes it the source of choice for tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{Dataset, LoadError};
use crate::record::{AggregatedPoint, BstsSummary, RawReport};
use crate::store::geography::{Geography, NeighborhoodName};
use crate::store::source::DatasetSource;

/// Fixture-backed [`DatasetSource`].
#[derive(Debug, Default)]
pub struct InMemorySource {
    geography: Geography,
    neighborhood_map: Vec<NeighborhoodName>,
    raw_reports: Vec<RawReport>,
    bsts_summaries: Vec<BstsSummary>,
    aggregated: Vec<AggregatedPoint>,
    failing: HashSet<Dataset>,
    fetches: AtomicUsize,
}

impl InMemorySource {
    /// An empty source: every dataset loads as empty.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the geography.
    #[must_use]
    pub fn with_geography(mut self, geography: Geography) -> Self {
        self.geography = geography;
        self
    }

    /// Sets the neighborhood name table.
    #[must_use]
    pub fn with_neighborhood_map(mut self, names: Vec<NeighborhoodName>) -> Self {
        self.neighborhood_map = names;
        self
    }

    /// Sets the raw reports.
    #[must_use]
    pub fn with_raw_reports(mut self, reports: Vec<RawReport>) -> Self {
        self.raw_reports = reports;
        self
    }

    /// Sets the BSTS summaries.
    #[must_use]
    pub fn with_bsts_summaries(mut self, summaries: Vec<BstsSummary>) -> Self {
        self.bsts_summaries = summaries;
        self
    }

    /// Sets the aggregated series.
    #[must_use]
    pub fn with_aggregated_series(mut self, points: Vec<AggregatedPoint>) -> Self {
        self.aggregated = points;
        self
    }

    /// Makes every load of `dataset` fail with a backend error.
    #[must_use]
    pub fn failing(mut self, dataset: Dataset) -> Self {
        self.failing.insert(dataset);
        self
    }

    /// Number of dataset fetches served so far, failed ones included.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn serve<T: Clone>(&self, dataset: Dataset, data: &T) -> Result<T, LoadError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&dataset) {
            return Err(LoadError::backend(dataset, "configured to fail"));
        }
        Ok(data.clone())
    }
}

#[async_trait]
impl DatasetSource for InMemorySource {
    async fn geography(&self) -> Result<Geography, LoadError> {
        self.serve(Dataset::Geography, &self.geography)
    }

    async fn neighborhood_map(&self) -> Result<Vec<NeighborhoodName>, LoadError> {
        self.serve(Dataset::NeighborhoodMap, &self.neighborhood_map)
    }

    async fn raw_reports(&self) -> Result<Vec<RawReport>, LoadError> {
        self.serve(Dataset::RawReports, &self.raw_reports)
    }

    async fn bsts_summaries(&self) -> Result<Vec<BstsSummary>, LoadError> {
        self.serve(Dataset::BstsSummaries, &self.bsts_summaries)
    }

    async fn aggregated_series(&self) -> Result<Vec<AggregatedPoint>, LoadError> {
        self.serve(Dataset::AggregatedSeries, &self.aggregated)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_source_serves_and_counts() {
        let source = InMemorySource::new();
        assert!(source.raw_reports().await.unwrap().is_empty());
        assert!(source.geography().await.unwrap().is_empty());
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_source_failure() {
        let source = InMemorySource::new().failing(Dataset::BstsSummaries);
        let err = source.bsts_summaries().await.unwrap_err();
        assert_eq!(err.dataset(), Dataset::BstsSummaries);
        assert!(source.aggregated_series().await.is_ok());
    }
}
