//! Remote data access, caching, and the series aligner.

pub mod align;
pub mod cache;
pub mod circuit_breaker;
pub mod fred;
pub mod normalize;
pub mod provider;

pub use align::align_series;
pub use cache::{CacheMeta, CacheStatus, SeriesCache};
pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use fred::{FredClient, FredConfig};
pub use normalize::{normalize_zscore, ColumnStats, ZeroVariancePolicy};
pub use provider::{CategorySource, DataError, FetchProgress, LogProgress, SeriesProvider};
