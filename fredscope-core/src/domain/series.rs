//! Observations, fetched series columns and the aligned table shapes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One dated observation. `value == None` means the source reported no value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservationPoint {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

impl ObservationPoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self {
            date,
            value: Some(value),
        }
    }

    pub fn missing(date: NaiveDate) -> Self {
        Self { date, value: None }
    }

    /// The value if present and finite.
    pub fn finite_value(&self) -> Option<f64> {
        self.value.filter(|v| v.is_finite())
    }
}

/// One indicator's observations, keyed by its display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesColumn {
    /// Display label, e.g. "Unemployment Rate".
    pub name: String,
    /// Remote series identifier, e.g. "UNRATE".
    pub source_id: String,
    pub points: Vec<ObservationPoint>,
}

impl SeriesColumn {
    pub fn new(
        name: impl Into<String>,
        source_id: impl Into<String>,
        points: Vec<ObservationPoint>,
    ) -> Self {
        Self {
            name: name.into(),
            source_id: source_id.into(),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A column of the aligned table. `values[i]` belongs to `AlignedTable::dates[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedColumn {
    pub name: String,
    pub source_id: String,
    pub values: Vec<Option<f64>>,
}

impl AlignedColumn {
    /// Present (non-missing) values in date order.
    pub fn present(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().filter_map(|v| *v)
    }

    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Several series on a shared, strictly ascending date axis.
///
/// Every column has exactly `dates.len()` cells. Cells without an
/// observation are `None`, never zero or interpolated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignedTable {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<AlignedColumn>,
}

impl AlignedTable {
    pub fn row_count(&self) -> usize {
        self.dates.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&AlignedColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Cell lookup by date and column name.
    pub fn value(&self, date: NaiveDate, column: &str) -> Option<f64> {
        let row = self.dates.binary_search(&date).ok()?;
        self.column(column)?.values[row]
    }

    /// Iterate rows as `(date, cells)` in ascending date order.
    pub fn rows(&self) -> impl Iterator<Item = (NaiveDate, Vec<Option<f64>>)> + '_ {
        self.dates.iter().enumerate().map(move |(i, date)| {
            let cells = self.columns.iter().map(|c| c.values[i]).collect();
            (*date, cells)
        })
    }

    /// Last `n` rows, the "latest rows" preview.
    pub fn tail(&self, n: usize) -> AlignedTable {
        let start = self.dates.len().saturating_sub(n);
        AlignedTable {
            dates: self.dates[start..].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|c| AlignedColumn {
                    name: c.name.clone(),
                    source_id: c.source_id.clone(),
                    values: c.values[start..].to_vec(),
                })
                .collect(),
        }
    }
}

/// Z-score output: same shape as the input table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTable {
    pub table: AlignedTable,
    /// Columns the zero-variance policy was applied to.
    pub degenerate: Vec<String>,
}

/// A series that could not be fetched, reported instead of aborting the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDescriptor {
    pub label: String,
    pub source_id: String,
    pub message: String,
}

impl std::fmt::Display for FailureDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.label, self.source_id, self.message)
    }
}
