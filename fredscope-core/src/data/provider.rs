//! Remote collaborator traits and structured error types.
//!
//! `SeriesProvider` and `CategorySource` abstract over the statistical data
//! API so the crawler and aligner can run against the real FRED client or an
//! in-memory mock.

use crate::domain::{CategoryId, ObservationPoint, SeriesRecord};
use chrono::NaiveDate;
use thiserror::Error;

/// Structured error types for remote data operations.
///
/// These are designed to be displayable in CLI output and failure lists.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("series not found: {series_id}")]
    SeriesNotFound { series_id: String },

    #[error("request rejected by provider: {0}")]
    RequestRejected(String),

    #[error("hard stop: data provider refused requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Transport-level failures worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataError::NetworkUnreachable(_) | DataError::RateLimited { .. }
        )
    }
}

/// Fetches a single series' observations over a date range.
///
/// Implementations handle the specifics of one source. The cache layer sits
/// above this trait; providers don't know about it.
pub trait SeriesProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch observations for `series_id` between `start` and `end` inclusive.
    fn fetch_series(
        &self,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ObservationPoint>, DataError>;

    /// Whether the provider is currently accepting requests.
    fn is_available(&self) -> bool;
}

/// The two category endpoints the catalog crawler walks.
pub trait CategorySource {
    /// Series listed directly under `category`.
    fn list_series(&self, category: CategoryId) -> Result<Vec<SeriesRecord>, DataError>;

    /// Direct child categories of `category`.
    fn list_children(&self, category: CategoryId) -> Result<Vec<CategoryId>, DataError>;
}

impl<T: CategorySource + ?Sized> CategorySource for &T {
    fn list_series(&self, category: CategoryId) -> Result<Vec<SeriesRecord>, DataError> {
        (**self).list_series(category)
    }

    fn list_children(&self, category: CategoryId) -> Result<Vec<CategoryId>, DataError> {
        (**self).list_children(category)
    }
}

/// Progress callback for multi-series fetches.
pub trait FetchProgress: Send + Sync {
    /// Called when starting to fetch a series.
    fn on_start(&self, label: &str, index: usize, total: usize);

    /// Called when a series fetch completes.
    fn on_complete(
        &self,
        label: &str,
        index: usize,
        total: usize,
        result: Result<usize, &DataError>,
    );

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that emits `tracing` events.
pub struct LogProgress;

impl FetchProgress for LogProgress {
    fn on_start(&self, label: &str, index: usize, total: usize) {
        tracing::info!(series = label, "[{}/{}] fetching", index + 1, total);
    }

    fn on_complete(
        &self,
        label: &str,
        _index: usize,
        _total: usize,
        result: Result<usize, &DataError>,
    ) {
        match result {
            Ok(points) => tracing::info!(series = label, points, "fetched"),
            Err(e) => tracing::warn!(series = label, error = %e, "fetch failed"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        tracing::info!(succeeded, failed, total, "series batch complete");
    }
}
