//! Series request pipeline: per-series fetch results in, aligned (and
//! optionally standardized) table out.
//!
//! Fetching happens upstream; this stage only sorts successes from
//! failures, merges the successes and applies z-scores on request.

use crate::data::align::align_series;
use crate::data::normalize::{normalize_zscore, ZeroVariancePolicy};
use crate::data::provider::DataError;
use crate::domain::{AlignedTable, FailureDescriptor, ObservationPoint, SeriesColumn};
use thiserror::Error;

/// Outcome of fetching one requested series.
#[derive(Debug)]
pub struct FetchedSeries {
    pub label: String,
    pub source_id: String,
    pub result: Result<Vec<ObservationPoint>, DataError>,
}

impl FetchedSeries {
    pub fn ok(label: impl Into<String>, source_id: impl Into<String>, points: Vec<ObservationPoint>) -> Self {
        Self {
            label: label.into(),
            source_id: source_id.into(),
            result: Ok(points),
        }
    }

    pub fn failed(label: impl Into<String>, source_id: impl Into<String>, error: DataError) -> Self {
        Self {
            label: label.into(),
            source_id: source_id.into(),
            result: Err(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentOutcome {
    /// Raw merged values.
    pub aligned: AlignedTable,
    /// What the caller should show: `aligned`, or its z-scores.
    pub display: AlignedTable,
    /// Columns hit by the zero-variance policy. Empty when not normalizing.
    pub degenerate: Vec<String>,
    /// Series that could not be fetched, in request order.
    pub failures: Vec<FailureDescriptor>,
}

impl AlignmentOutcome {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no data retrieved: all {} requested series failed", failures.len())]
    EmptyResult { failures: Vec<FailureDescriptor> },
}

/// Merge the successful fetches on date and optionally z-score them.
///
/// Failed series never abort the batch; they are returned as
/// [`FailureDescriptor`]s alongside the table. Only when nothing succeeded
/// is the request an error.
pub fn align_and_normalize(
    fetched: Vec<FetchedSeries>,
    normalize: bool,
    policy: ZeroVariancePolicy,
) -> Result<AlignmentOutcome, PipelineError> {
    let mut columns = Vec::with_capacity(fetched.len());
    let mut failures = Vec::new();

    for series in fetched {
        match series.result {
            Ok(points) => {
                columns.push(SeriesColumn::new(series.label, series.source_id, points));
            }
            Err(e) => {
                tracing::warn!(
                    label = %series.label,
                    series_id = %series.source_id,
                    error = %e,
                    "series fetch failed"
                );
                failures.push(FailureDescriptor {
                    label: series.label,
                    source_id: series.source_id,
                    message: e.to_string(),
                });
            }
        }
    }

    if columns.is_empty() {
        return Err(PipelineError::EmptyResult { failures });
    }

    let aligned = align_series(&columns);
    tracing::info!(
        rows = aligned.row_count(),
        columns = aligned.column_count(),
        failed = failures.len(),
        "series aligned"
    );

    let (display, degenerate) = if normalize {
        let normalized = normalize_zscore(&aligned, policy);
        (normalized.table, normalized.degenerate)
    } else {
        (aligned.clone(), Vec::new())
    };

    Ok(AlignmentOutcome {
        aligned,
        display,
        degenerate,
        failures,
    })
}
