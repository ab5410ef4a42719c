//! Z-score standardization of an aligned table.
//!
//! Each column is standardized against its own mean and sample standard
//! deviation, computed over the cells currently present in the table. The
//! baseline is therefore relative to the selected date range and series set.

use crate::domain::{AlignedColumn, AlignedTable, NormalizedTable};
use serde::{Deserialize, Serialize};

/// Spread below this fraction of the mean is rounding noise, not variance.
const RELATIVE_TOLERANCE: f64 = 16.0 * f64::EPSILON;

/// What to do with a column whose standard deviation is zero or undefined
/// (a constant series, or fewer than two present values).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroVariancePolicy {
    /// Every cell of the column becomes missing.
    #[default]
    Missing,
    /// The column keeps its raw values.
    Unchanged,
}

/// Mean and sample standard deviation of the present cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub count: usize,
    pub mean: f64,
    /// `None` with fewer than two present values.
    pub std_dev: Option<f64>,
}

impl ColumnStats {
    pub fn of(column: &AlignedColumn) -> Option<Self> {
        let values: Vec<f64> = column.present().filter(|v| v.is_finite()).collect();
        let count = values.len();
        if count == 0 {
            return None;
        }
        let mean = values.iter().sum::<f64>() / count as f64;
        let constant = values.windows(2).all(|w| w[0] == w[1]);
        let std_dev = (count >= 2).then(|| {
            if constant {
                return 0.0;
            }
            let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        });
        Some(Self {
            count,
            mean,
            std_dev,
        })
    }

    /// Usable divisor, or `None` when the column is degenerate.
    fn scale(&self) -> Option<f64> {
        let tolerance = RELATIVE_TOLERANCE * self.mean.abs();
        self.std_dev
            .filter(|s| s.is_finite() && *s > 0.0 && *s > tolerance)
    }
}

/// Standardize every column to zero mean and unit sample standard deviation.
///
/// Missing cells are excluded from the statistics and stay missing.
/// Degenerate columns are handled by `policy` and listed in
/// [`NormalizedTable::degenerate`].
pub fn normalize_zscore(table: &AlignedTable, policy: ZeroVariancePolicy) -> NormalizedTable {
    let mut degenerate = Vec::new();

    let columns = table
        .columns
        .iter()
        .map(|column| {
            let scale = ColumnStats::of(column).and_then(|s| s.scale().map(|sd| (s.mean, sd)));
            match scale {
                Some((mean, sd)) => AlignedColumn {
                    values: column
                        .values
                        .iter()
                        .map(|v| v.filter(|x| x.is_finite()).map(|x| (x - mean) / sd))
                        .collect(),
                    ..column.clone()
                },
                None => {
                    tracing::warn!(
                        column = %column.name,
                        ?policy,
                        "zero variance, column cannot be standardized"
                    );
                    degenerate.push(column.name.clone());
                    match policy {
                        ZeroVariancePolicy::Missing => AlignedColumn {
                            values: vec![None; column.values.len()],
                            ..column.clone()
                        },
                        ZeroVariancePolicy::Unchanged => column.clone(),
                    }
                }
            }
        })
        .collect();

    NormalizedTable {
        table: AlignedTable {
            dates: table.dates.clone(),
            columns,
        },
        degenerate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn table(cols: Vec<(&str, Vec<Option<f64>>)>) -> AlignedTable {
        let n = cols.first().map(|(_, v)| v.len()).unwrap_or(0);
        let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        AlignedTable {
            dates: (0..n)
                .map(|i| base + chrono::Duration::days(i as i64 * 31))
                .collect(),
            columns: cols
                .into_iter()
                .map(|(name, values)| AlignedColumn {
                    name: name.into(),
                    source_id: name.to_uppercase(),
                    values,
                })
                .collect(),
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn standardizes_to_zero_mean_unit_sample_std() {
        let t = table(vec![("A", vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)])]);
        let n = normalize_zscore(&t, ZeroVariancePolicy::default());

        let stats = ColumnStats::of(&n.table.columns[0]).unwrap();
        assert!(close(stats.mean, 0.0));
        assert!(close(stats.std_dev.unwrap(), 1.0));
        assert!(n.degenerate.is_empty());

        // sample std of 1..4 is sqrt(5/3)
        let expected_first = (1.0 - 2.5) / (5.0_f64 / 3.0).sqrt();
        assert!(close(n.table.columns[0].values[0].unwrap(), expected_first));
    }

    #[test]
    fn missing_cells_excluded_and_preserved() {
        let t = table(vec![("A", vec![Some(10.0), None, Some(20.0), None])]);
        let n = normalize_zscore(&t, ZeroVariancePolicy::default());
        let v = &n.table.columns[0].values;
        assert!(v[1].is_none());
        assert!(v[3].is_none());
        // two points: ±1/sqrt(2)
        assert!(close(v[0].unwrap(), -std::f64::consts::FRAC_1_SQRT_2));
        assert!(close(v[2].unwrap(), std::f64::consts::FRAC_1_SQRT_2));
    }

    #[test]
    fn columns_are_standardized_independently() {
        let t = table(vec![
            ("small", vec![Some(0.01), Some(0.02), Some(0.03)]),
            ("large", vec![Some(1e6), Some(3e6), Some(2e6)]),
        ]);
        let n = normalize_zscore(&t, ZeroVariancePolicy::default());
        assert!(close(n.table.columns[0].values[0].unwrap(), -1.0));
        assert!(close(n.table.columns[1].values[1].unwrap(), 1.0));
    }

    #[test]
    fn constant_column_becomes_missing_by_default() {
        let t = table(vec![
            ("flat", vec![Some(7.25), Some(7.25), None, Some(7.25)]),
            ("moving", vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]),
        ]);
        let n = normalize_zscore(&t, ZeroVariancePolicy::Missing);

        assert_eq!(n.degenerate, vec!["flat".to_string()]);
        assert!(n.table.columns[0].values.iter().all(|v| v.is_none()));
        assert!(n.table.columns[1].values.iter().all(|v| v.is_some()));
        assert!(n
            .table
            .columns
            .iter()
            .flat_map(|c| c.present())
            .all(f64::is_finite));
    }

    #[test]
    fn tiny_but_varying_column_is_standardized() {
        let t = table(vec![("tiny", vec![Some(1e-13), Some(2e-13), Some(3e-13)])]);
        let n = normalize_zscore(&t, ZeroVariancePolicy::Missing);

        assert!(n.degenerate.is_empty());
        let v = &n.table.columns[0].values;
        assert!(close(v[0].unwrap(), -1.0));
        assert!(close(v[1].unwrap(), 0.0));
        assert!(close(v[2].unwrap(), 1.0));
    }

    #[test]
    fn repeated_inexact_decimal_is_still_constant() {
        let t = table(vec![("flat", vec![Some(0.1), Some(0.1), Some(0.1)])]);
        let stats = ColumnStats::of(&t.columns[0]).unwrap();
        assert_eq!(stats.std_dev, Some(0.0));

        let n = normalize_zscore(&t, ZeroVariancePolicy::Missing);
        assert_eq!(n.degenerate, vec!["flat".to_string()]);
    }

    #[test]
    fn non_finite_cells_become_missing() {
        let t = table(vec![(
            "A",
            vec![Some(1.0), Some(f64::NAN), Some(2.0), Some(f64::INFINITY), Some(3.0)],
        )]);
        let n = normalize_zscore(&t, ZeroVariancePolicy::Missing);
        let v = &n.table.columns[0].values;

        assert!(v[1].is_none());
        assert!(v[3].is_none());
        assert!(close(v[0].unwrap(), -1.0));
        assert!(close(v[4].unwrap(), 1.0));
    }

    #[test]
    fn constant_column_kept_raw_with_unchanged_policy() {
        let t = table(vec![("flat", vec![Some(7.25), Some(7.25), Some(7.25)])]);
        let n = normalize_zscore(&t, ZeroVariancePolicy::Unchanged);
        assert_eq!(n.degenerate, vec!["flat".to_string()]);
        assert_eq!(n.table.columns[0].values, t.columns[0].values);
    }

    #[test]
    fn single_point_is_degenerate() {
        let t = table(vec![("one", vec![None, Some(3.0), None])]);
        let n = normalize_zscore(&t, ZeroVariancePolicy::Missing);
        assert_eq!(n.degenerate, vec!["one".to_string()]);
        assert_eq!(n.table.columns[0].values, vec![None, None, None]);
    }

    #[test]
    fn all_missing_column_is_degenerate() {
        let t = table(vec![("empty", vec![None, None])]);
        let n = normalize_zscore(&t, ZeroVariancePolicy::Missing);
        assert_eq!(n.degenerate, vec!["empty".to_string()]);
    }

    #[test]
    fn normalizing_normalized_data_is_stable() {
        let t = table(vec![("A", vec![Some(3.0), Some(9.0), Some(4.0), Some(1.0), Some(8.0)])]);
        let once = normalize_zscore(&t, ZeroVariancePolicy::default());
        let twice = normalize_zscore(&once.table, ZeroVariancePolicy::default());
        for (a, b) in once.table.columns[0]
            .values
            .iter()
            .zip(&twice.table.columns[0].values)
        {
            assert!(close(a.unwrap(), b.unwrap()));
        }
    }

    #[test]
    fn same_input_same_output() {
        let t = table(vec![("A", vec![Some(1.5), None, Some(-2.0), Some(0.25)])]);
        assert_eq!(
            normalize_zscore(&t, ZeroVariancePolicy::default()),
            normalize_zscore(&t, ZeroVariancePolicy::default())
        );
    }

    #[test]
    fn shape_is_preserved() {
        let t = table(vec![
            ("A", vec![Some(1.0), Some(2.0), None]),
            ("B", vec![None, Some(5.0), Some(6.0)]),
        ]);
        let n = normalize_zscore(&t, ZeroVariancePolicy::default());
        assert_eq!(n.table.dates, t.dates);
        assert_eq!(n.table.column_names(), t.column_names());
        assert!(n.table.columns.iter().all(|c| c.values.len() == 3));
    }
}
