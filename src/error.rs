//! Error types for QuakeView.
//!
//! All errors in QuakeView are strongly typed using thiserror.
//! Only dataset loading and configuration can fail: record-level
//! anomalies are absorbed by the normalizer and never surface here.

use std::path::PathBuf;

use thiserror::Error;

/// The datasets the store loads, used to label load failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    /// Neighborhood polygons.
    Geography,
    /// Neighborhood id to name table.
    NeighborhoodMap,
    /// Citizen damage reports.
    RawReports,
    /// Per-hour BSTS model summaries.
    BstsSummaries,
    /// Aggregated BSTS forecast series.
    AggregatedSeries,
}

impl Dataset {
    /// Stable name used in logs and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Geography => "geography",
            Self::NeighborhoodMap => "neighborhood_map",
            Self::RawReports => "raw_reports",
            Self::BstsSummaries => "bsts_summaries",
            Self::AggregatedSeries => "aggregated_series",
        }
    }
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dataset could not be retrieved or parsed.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {dataset} from {path:?}: {source}")]
    Io {
        dataset: Dataset,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {dataset}: {message}")]
    Parse {
        dataset: Dataset,
        message: String,
    },

    #[error("Source error while loading {dataset}: {message}")]
    Source {
        dataset: Dataset,
        message: String,
    },
}

impl LoadError {
    /// Creates a parse error for a dataset.
    #[must_use]
    pub fn parse(dataset: Dataset, message: impl Into<String>) -> Self {
        Self::Parse {
            dataset,
            message: message.into(),
        }
    }

    /// Creates a backend error for a dataset.
    #[must_use]
    pub fn backend(dataset: Dataset, message: impl Into<String>) -> Self {
        Self::Source {
            dataset,
            message: message.into(),
        }
    }

    /// The dataset that failed.
    #[must_use]
    pub const fn dataset(&self) -> Dataset {
        match self {
            Self::Io { dataset, .. } | Self::Parse { dataset, .. } | Self::Source { dataset, .. } => {
                *dataset
            }
        }
    }
}

/// Invalid configuration values.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Field '{field}' must be positive (got {value})")]
    NotPositive {
        field: &'static str,
        value: f64,
    },

    #[error("Field '{field}' must be at most {max} (got {value})")]
    TooLarge {
        field: &'static str,
        value: f64,
        max: f64,
    },

    #[error("Field '{field}' cannot be empty")]
    EmptyField {
        field: &'static str,
    },

    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Top-level error type for QuakeView.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum QuakeError {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl QuakeError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a dataset load failure.
    #[must_use]
    pub const fn is_load(&self) -> bool {
        matches!(self, Self::Load(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if retrying the same request may succeed.
    ///
    /// Failed loads are not cached, so a later call retries the source.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Load(e) => matches!(e, LoadError::Io { .. } | LoadError::Source { .. }),
            Self::Config(_) | Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for QuakeView operations.
pub type QuakeResult<T> = Result<T, QuakeError>;
