//! Property tests for crawler and aligner invariants.
//!
//! Uses proptest to verify:
//! 1. Crawl bounds — every reachable category is expanded exactly once
//! 2. Date union — the aligned axis is exactly the union of input dates
//! 3. Strict ordering — aligned dates are strictly ascending
//! 4. Value preservation — every input observation lands in its cell
//! 5. Z-score — standardized columns have mean ≈ 0 and sample std ≈ 1

use chrono::NaiveDate;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};

use fredscope_core::catalog::{crawl_catalog_with, CrawlOptions, InMemoryCatalog};
use fredscope_core::data::{align_series, normalize_zscore, ColumnStats, ZeroVariancePolicy};
use fredscope_core::domain::{CategoryId, ObservationPoint, SeriesColumn};

// ── Strategies (proptest) ────────────────────────────────────────────

/// Edges of a random directed graph over `0..nodes`, cycles allowed.
fn arb_graph() -> impl Strategy<Value = (u32, Vec<(u32, u32)>)> {
    (1u32..40).prop_flat_map(|nodes| {
        let edges = prop::collection::vec((0..nodes, 0..nodes), 0..120);
        (Just(nodes), edges)
    })
}

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (0i64..3000).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2000, 1, 1).unwrap() + chrono::Duration::days(offset)
    })
}

/// One series with distinct dates in arbitrary order.
fn arb_series(index: usize) -> impl Strategy<Value = SeriesColumn> {
    prop::collection::hash_map(arb_date(), -1e6..1e6_f64, 0..60).prop_map(move |points| {
        let points = points
            .into_iter()
            .map(|(date, value)| ObservationPoint::new(date, value))
            .collect();
        SeriesColumn::new(format!("series {index}"), format!("S{index}"), points)
    })
}

fn arb_columns() -> impl Strategy<Value = Vec<SeriesColumn>> {
    (1usize..6).prop_flat_map(|n| (0..n).map(arb_series).collect::<Vec<_>>())
}

fn build_catalog(edges: &[(u32, u32)], series_on: &[u32]) -> InMemoryCatalog {
    let mut adjacency: HashMap<u32, Vec<u32>> = HashMap::new();
    for &(from, to) in edges {
        adjacency.entry(from).or_default().push(to);
    }
    let mut catalog = InMemoryCatalog::new();
    for (from, to) in adjacency {
        catalog = catalog.with_children(from, &to);
    }
    for &node in series_on {
        catalog = catalog.with_series(node, &["X"]);
    }
    catalog
}

// ── 1. Crawl Bounds ──────────────────────────────────────────────────

proptest! {
    /// Each reachable category gets exactly one series call and one
    /// children call, so total calls are 2 × reachable.
    #[test]
    fn crawl_expands_each_category_once((nodes, edges) in arb_graph()) {
        let series_on: Vec<u32> = (0..nodes).filter(|n| n % 3 == 0).collect();
        let catalog = build_catalog(&edges, &series_on);
        let reachable = catalog.reachable_from(CategoryId::ROOT);

        let report = crawl_catalog_with(&catalog, &CrawlOptions::default(), None);

        prop_assert_eq!(report.visited, reachable);
        prop_assert_eq!(catalog.total_calls(), 2 * reachable);
        for node in 0..nodes {
            prop_assert!(catalog.series_calls(CategoryId(node)) <= 1);
            prop_assert!(catalog.children_calls(CategoryId(node)) <= 1);
        }
        prop_assert!(report.failures.is_empty());
    }

    /// Output size is the sum of series listed at reachable categories.
    #[test]
    fn crawl_collects_one_record_per_listing((nodes, edges) in arb_graph()) {
        let series_on: Vec<u32> = (0..nodes).collect();
        let catalog = build_catalog(&edges, &series_on);
        let reachable = catalog.reachable_from(CategoryId::ROOT);

        let report = crawl_catalog_with(&catalog, &CrawlOptions::default(), None);

        prop_assert_eq!(report.table.len(), reachable);
        prop_assert_eq!(report.table.distinct_ids(), 1);
    }
}

// ── 2–4. Alignment ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn aligned_dates_are_the_union(columns in arb_columns()) {
        let expected: BTreeSet<NaiveDate> = columns
            .iter()
            .flat_map(|c| c.points.iter().map(|p| p.date))
            .collect();

        let table = align_series(&columns);

        let got: BTreeSet<NaiveDate> = table.dates.iter().copied().collect();
        prop_assert_eq!(got, expected);
        prop_assert_eq!(table.column_count(), columns.len());
        for column in &table.columns {
            prop_assert_eq!(column.values.len(), table.row_count());
        }
    }

    #[test]
    fn aligned_dates_strictly_ascend(columns in arb_columns()) {
        let table = align_series(&columns);
        for pair in table.dates.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn every_observation_lands_in_its_cell(columns in arb_columns()) {
        let table = align_series(&columns);
        for (input, output) in columns.iter().zip(&table.columns) {
            for point in &input.points {
                let row = table.dates.binary_search(&point.date).unwrap();
                prop_assert_eq!(output.values[row], point.value);
            }
            prop_assert_eq!(output.present_count(), input.points.len());
        }
    }
}

// ── 5. Z-Score ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn zscore_has_zero_mean_unit_std(columns in arb_columns()) {
        let table = align_series(&columns);
        let normalized = normalize_zscore(&table, ZeroVariancePolicy::Missing);

        for column in &normalized.table.columns {
            prop_assert!(column.present().all(f64::is_finite));
            if normalized.degenerate.contains(&column.name) {
                prop_assert_eq!(column.present_count(), 0);
                continue;
            }
            let stats = ColumnStats::of(column).unwrap();
            prop_assert!(stats.mean.abs() < 1e-6, "mean {}", stats.mean);
            let std = stats.std_dev.unwrap();
            prop_assert!((std - 1.0).abs() < 1e-6, "std {}", std);
        }
    }

    #[test]
    fn zscore_preserves_missing_pattern(columns in arb_columns()) {
        let table = align_series(&columns);
        let normalized = normalize_zscore(&table, ZeroVariancePolicy::Unchanged);
        for (raw, z) in table.columns.iter().zip(&normalized.table.columns) {
            for (a, b) in raw.values.iter().zip(&z.values) {
                prop_assert_eq!(a.is_some(), b.is_some());
            }
        }
    }
}
