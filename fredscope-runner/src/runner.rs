//! Series request runner: region + labels + date range → aligned outcome.
//!
//! Two entry points:
//! - `run_series_request()`: resolves the request against the config, loads
//!   each series (cache first) and aligns them. Used by the CLI.
//! - `align_loaded()`: takes pre-loaded fetch results. Used when the caller
//!   manages fetching itself.

use chrono::NaiveDate;
use thiserror::Error;

use fredscope_core::data::{FetchProgress, SeriesCache, SeriesProvider, ZeroVariancePolicy};
use fredscope_core::pipeline::{align_and_normalize, AlignmentOutcome, FetchedSeries, PipelineError};

use crate::config::{resolve_date_range, AppConfig, ConfigError, SeriesEntry};
use crate::data_loader::{load_series, LoadOptions};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// What the user asked for.
#[derive(Debug, Clone, Default)]
pub struct SeriesRequest {
    pub region: String,
    /// Labels within the region. Empty selects the region's defaults.
    pub labels: Vec<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Convert each column to z-scores for display.
    pub normalize: bool,
    pub zero_variance: ZeroVariancePolicy,
    /// Bypass cached entries.
    pub force: bool,
}

/// A resolved and executed request.
#[derive(Debug, Clone)]
pub struct SeriesResponse {
    pub region: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub selected: Vec<SeriesEntry>,
    pub outcome: AlignmentOutcome,
}

/// Resolve, load and align one request.
///
/// `today` is the default end date. The cache is optional so tests and
/// `--no-cache` runs can go straight to the provider.
pub fn run_series_request(
    config: &AppConfig,
    request: &SeriesRequest,
    provider: &dyn SeriesProvider,
    cache: Option<&SeriesCache>,
    progress: Option<&dyn FetchProgress>,
    today: NaiveDate,
) -> Result<SeriesResponse, RequestError> {
    let region = config.region(&request.region)?;
    let selected = region.select(&request.labels)?;
    let (start, end) = resolve_date_range(request.start, request.end, today)?;

    tracing::info!(
        region = %region.name,
        series = selected.len(),
        %start,
        %end,
        normalize = request.normalize,
        "running series request"
    );

    let opts = LoadOptions {
        start,
        end,
        force: request.force,
        mode: config.fetch_mode(),
    };
    let fetched = load_series(&selected, provider, cache, progress, &opts);
    let outcome = align_loaded(fetched, request)?;

    Ok(SeriesResponse {
        region: region.name.clone(),
        start,
        end,
        selected,
        outcome,
    })
}

/// Align pre-loaded fetch results with the request's display options.
pub fn align_loaded(
    fetched: Vec<FetchedSeries>,
    request: &SeriesRequest,
) -> Result<AlignmentOutcome, PipelineError> {
    align_and_normalize(fetched, request.normalize, request.zero_variance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fredscope_core::data::DataError;
    use fredscope_core::domain::ObservationPoint;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NeverCalled(AtomicUsize);

    impl SeriesProvider for NeverCalled {
        fn name(&self) -> &str {
            "never"
        }

        fn fetch_series(
            &self,
            _series_id: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<ObservationPoint>, DataError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    #[test]
    fn invalid_range_fails_before_fetching() {
        let provider = NeverCalled(AtomicUsize::new(0));
        let request = SeriesRequest {
            region: "National".into(),
            start: NaiveDate::from_ymd_opt(2020, 1, 1),
            end: NaiveDate::from_ymd_opt(2019, 1, 1),
            ..SeriesRequest::default()
        };
        let err = run_series_request(&AppConfig::default(), &request, &provider, None, None, today())
            .unwrap_err();
        assert!(matches!(err, RequestError::Config(ConfigError::InvalidDateRange { .. })));
        assert_eq!(provider.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_region_fails_before_fetching() {
        let provider = NeverCalled(AtomicUsize::new(0));
        let request = SeriesRequest {
            region: "Atlantis".into(),
            ..SeriesRequest::default()
        };
        let err = run_series_request(&AppConfig::default(), &request, &provider, None, None, today())
            .unwrap_err();
        assert!(matches!(err, RequestError::Config(ConfigError::UnknownRegion { .. })));
        assert_eq!(provider.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn default_selection_fetches_two_series() {
        let provider = NeverCalled(AtomicUsize::new(0));
        let request = SeriesRequest {
            region: "Missouri".into(),
            ..SeriesRequest::default()
        };
        let response =
            run_series_request(&AppConfig::default(), &request, &provider, None, None, today())
                .unwrap();
        assert_eq!(provider.0.load(Ordering::SeqCst), 2);
        assert_eq!(response.selected.len(), 2);
        assert_eq!(response.end, today());
        assert_eq!(response.outcome.aligned.column_count(), 2);
    }
}
