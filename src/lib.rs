//! # QuakeView - Uncertainty Reconciliation for Earthquake Damage Data
//!
//! QuakeView reduces heterogeneous damage data (citizen reports and BSTS
//! model summaries with intervals, CIRs, standard deviations and certainty
//! labels) to one consistent estimate per neighborhood, category and time.
//!
//! ## Core Concepts
//!
//! - **Certainty algebra**: conversions between labels, numeric certainty,
//!   CIR, SD and explicit interval bounds
//! - **Normalizer**: a fixed priority order that turns any record into a
//!   [`DamageEstimate`]
//! - **Temporal index**: latest-record-as-of queries, point and bulk
//! - **Data store**: load-once datasets with coalesced, memoized snapshots
//! - **Views**: neighborhood, map, comparison, forecast and insight reductions
//!
//! ## Usage
//!
//! ```rust,no_run
//! use quakeview::{views, Category, DataStore, LocationId, StoreConfig};
//!
//! # async fn run() -> quakeview::QuakeResult<()> {
//! let config = StoreConfig::from_json_file("quakeview.json")?;
//! let store = DataStore::from_config(config);
//!
//! let time = quakeview::time::parse_instant("2020-04-08 09:00").unwrap();
//! let snapshot = views::neighborhood_snapshot(&store, &LocationId::from(5), time).await?;
//! let buildings = snapshot.category(Category::Buildings).unwrap();
//! println!("{} {:.1} ({})", snapshot.name, buildings.estimate.value, buildings.estimate.severity);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Pure reconciliation
pub mod category;
pub mod certainty;
pub mod error;
pub mod estimate;
pub mod normalize;
pub mod record;
pub mod temporal;
pub mod time;

// Data access and views
pub mod store;
pub mod views;

// Re-export primary types at crate root for convenience
pub use category::{Category, LocationId, UnknownCategory};
pub use certainty::{CertaintyBand, CertaintyLevel, Interval};
pub use error::{ConfigError, Dataset, LoadError, QuakeError, QuakeResult};
pub use estimate::{overall_status, severity_from_value, DamageEstimate, Severity};
pub use normalize::{normalize, reconcile, CertaintyBasis, NormalizeParams, Reconciliation, RecordKind};
pub use record::{AggregatedPoint, BstsSummary, RawReport, Reading, Timestamped};
pub use temporal::TemporalIndex;
pub use time::TimeRange;

pub use store::{
    BstsSnapshot, DataStore, DatasetSource, FileSource, Geography, InMemorySource, RawReports,
    RequestGeneration, StoreConfig, StoreStats, Ticket,
};
