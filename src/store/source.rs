//! Dataset source abstraction.
//!
//! The store never fetches data itself. It is handed a [`DatasetSource`] at
//! construction time:
//! - [`InMemorySource`](super::InMemorySource): fixtures for tests and embedding
//! - [`FileSource`](super::FileSource): a data directory on disk

use async_trait::async_trait;

use crate::error::LoadError;
use crate::record::{AggregatedPoint, BstsSummary, RawReport};
use crate::store::geography::{Geography, NeighborhoodName};

/// Supplies each raw dataset. Every method is called at most once per
/// successful load by [`DataStore`](super::DataStore).
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Neighborhood polygons.
    async fn geography(&self) -> Result<Geography, LoadError>;

    /// Neighborhood id to name table.
    async fn neighborhood_map(&self) -> Result<Vec<NeighborhoodName>, LoadError>;

    /// Citizen damage reports.
    async fn raw_reports(&self) -> Result<Vec<RawReport>, LoadError>;

    /// Hourly BSTS summaries.
    async fn bsts_summaries(&self) -> Result<Vec<BstsSummary>, LoadError>;

    /// Aggregated BSTS forecast series.
    async fn aggregated_series(&self) -> Result<Vec<AggregatedPoint>, LoadError>;

    /// Source name for logging.
    fn name(&self) -> &str;
}
