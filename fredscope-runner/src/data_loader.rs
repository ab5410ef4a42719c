//! Series loading for the runner.
//!
//! Given the selected series entries, loads observations with a cache-first
//! policy:
//! 1. If a fresh cache entry exists for the exact range → use it
//! 2. Otherwise fetch from the provider and cache the result
//! 3. A failed fetch is kept as a per-series error; siblings still load
//!
//! Fetches run sequentially by default, or on a bounded rayon pool.
//! Either way the results come back in request order.

use chrono::NaiveDate;
use fredscope_core::data::{DataError, FetchProgress, SeriesCache, SeriesProvider};
use fredscope_core::domain::ObservationPoint;
use fredscope_core::pipeline::FetchedSeries;
use rayon::prelude::*;

use crate::config::{FetchMode, SeriesEntry};

/// Options controlling how series are loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Skip the cache read (results are still written back).
    pub force: bool,
    pub mode: FetchMode,
}

/// Where one series' observations came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Cache,
    Provider,
}

/// Load every entry, returning one [`FetchedSeries`] per entry in input order.
pub fn load_series(
    entries: &[SeriesEntry],
    provider: &dyn SeriesProvider,
    cache: Option<&SeriesCache>,
    progress: Option<&dyn FetchProgress>,
    opts: &LoadOptions,
) -> Vec<FetchedSeries> {
    let total = entries.len();
    let load = |(index, entry): (usize, &SeriesEntry)| {
        if let Some(p) = progress {
            p.on_start(&entry.label, index, total);
        }
        let result = load_one(entry, provider, cache, opts).map(|(points, _)| points);
        if let Some(p) = progress {
            p.on_complete(&entry.label, index, total, result.as_ref().map(Vec::len));
        }
        FetchedSeries {
            label: entry.label.clone(),
            source_id: entry.id.clone(),
            result,
        }
    };

    let fetched: Vec<FetchedSeries> = match opts.mode {
        FetchMode::Sequential => entries.iter().enumerate().map(&load).collect(),
        FetchMode::Parallel { max_workers } => {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(max_workers.max(1))
                .build()
            {
                // indexed collect keeps input order
                Ok(pool) => pool.install(|| entries.par_iter().enumerate().map(&load).collect()),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to build fetch pool, loading sequentially");
                    entries.iter().enumerate().map(&load).collect()
                }
            }
        }
    };

    if let Some(p) = progress {
        let failed = fetched.iter().filter(|f| f.result.is_err()).count();
        p.on_batch_complete(total - failed, failed, total);
    }
    fetched
}

/// Load a single series, cache first.
pub fn load_one(
    entry: &SeriesEntry,
    provider: &dyn SeriesProvider,
    cache: Option<&SeriesCache>,
    opts: &LoadOptions,
) -> Result<(Vec<ObservationPoint>, LoadSource), DataError> {
    if !opts.force {
        if let Some(points) = cache.and_then(|c| c.get(&entry.id, opts.start, opts.end)) {
            return Ok((points, LoadSource::Cache));
        }
    }

    if !provider.is_available() {
        return Err(DataError::CircuitBreakerTripped);
    }

    let points = provider.fetch_series(&entry.id, opts.start, opts.end)?;
    if let Some(c) = cache {
        if let Err(e) = c.put(&entry.id, opts.start, opts.end, &points, provider.name()) {
            tracing::warn!(series_id = %entry.id, error = %e, "failed to cache series");
        }
    }
    Ok((points, LoadSource::Provider))
}
