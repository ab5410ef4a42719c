//! Multi-series time alignment.
//!
//! Given observations for several series, place them on one date axis: the
//! union of every input's dates, ascending. A series without an observation
//! on a date gets a missing cell (no forward-fill, no interpolation), so
//! monthly, quarterly and annual series can share a table without dropping
//! rows.

use crate::domain::{AlignedColumn, AlignedTable, SeriesColumn};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Full outer join of all columns on date, as a single N-ary merge.
///
/// Column order follows input order. Within one column a repeated date keeps
/// its first observation. Duplicate display names get ` [SOURCE_ID]`
/// appended so every column stays addressable.
pub fn align_series(columns: &[SeriesColumn]) -> AlignedTable {
    let all_dates: BTreeSet<NaiveDate> = columns
        .iter()
        .flat_map(|c| c.points.iter().map(|p| p.date))
        .collect();
    let dates: Vec<NaiveDate> = all_dates.into_iter().collect();

    let row_of: HashMap<NaiveDate, usize> =
        dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

    let names = unique_names(columns);
    let aligned = columns
        .iter()
        .zip(names)
        .map(|(column, name)| {
            let mut values: Vec<Option<f64>> = vec![None; dates.len()];
            let mut filled = vec![false; dates.len()];
            for point in &column.points {
                let row = row_of[&point.date];
                if filled[row] {
                    tracing::debug!(
                        series = %column.name,
                        date = %point.date,
                        "duplicate observation date, keeping first"
                    );
                    continue;
                }
                filled[row] = true;
                values[row] = point.finite_value();
            }
            AlignedColumn {
                name,
                source_id: column.source_id.clone(),
                values,
            }
        })
        .collect();

    AlignedTable {
        dates,
        columns: aligned,
    }
}

fn unique_names(columns: &[SeriesColumn]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for c in columns {
        *counts.entry(c.name.as_str()).or_default() += 1;
    }
    let mut taken: HashSet<String> = HashSet::new();
    columns
        .iter()
        .map(|c| {
            let mut name = if counts[c.name.as_str()] > 1 {
                format!("{} [{}]", c.name, c.source_id)
            } else {
                c.name.clone()
            };
            // same label and same source id twice
            let base = name.clone();
            let mut n = 2;
            while !taken.insert(name.clone()) {
                name = format!("{base} #{n}");
                n += 1;
            }
            name
        })
        .collect()
}
