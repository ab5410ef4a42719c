//! Catalog crawler: frontier traversal of the remote category tree.
//!
//! The category graph may share children between parents or even contain
//! cycles. The visited set, checked when an id is popped, is what bounds the
//! crawl: every distinct category is expanded at most once, so the number of
//! remote calls is at most two per reachable category.

use crate::data::provider::{CategorySource, DataError};
use crate::domain::{CatalogTable, CategoryId};
use serde::Serialize;
use std::collections::HashSet;

/// Which of the two category calls failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryOperation {
    ListSeries,
    ListChildren,
}

/// A category call that degraded to an empty result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryFailure {
    pub category: CategoryId,
    pub operation: CategoryOperation,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub root: CategoryId,
    /// Stop expanding after this many categories. `None` crawls everything.
    pub max_categories: Option<usize>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            root: CategoryId::ROOT,
            max_categories: None,
        }
    }
}

/// Everything a crawl produced.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub table: CatalogTable,
    /// Distinct categories expanded.
    pub visited: usize,
    pub series_calls: usize,
    pub children_calls: usize,
    pub failures: Vec<CategoryFailure>,
    /// True when `max_categories` cut the crawl short.
    pub truncated: bool,
}

/// Progress callback, invoked once per expanded category.
pub trait CrawlProgress {
    fn on_category(&self, category: CategoryId, visited: usize, frontier: usize, records: usize);
}

/// Progress reporter that emits a `tracing` event every `every` categories.
pub struct LogCrawlProgress {
    pub every: usize,
}

impl CrawlProgress for LogCrawlProgress {
    fn on_category(&self, category: CategoryId, visited: usize, frontier: usize, records: usize) {
        if self.every > 0 && visited % self.every == 0 {
            tracing::info!(%category, visited, frontier, records, "crawling catalog");
        }
    }
}

/// Crawl the whole tree from the root and return the flat catalog.
pub fn crawl_catalog<S: CategorySource + ?Sized>(source: &S) -> CatalogTable {
    crawl_catalog_with(source, &CrawlOptions::default(), None).table
}

/// Crawl with explicit options and an optional progress callback.
///
/// A failing call for one category is logged, recorded in
/// [`CrawlReport::failures`] and treated as "no series" / "no children";
/// the rest of the frontier is still processed.
pub fn crawl_catalog_with<S: CategorySource + ?Sized>(
    source: &S,
    options: &CrawlOptions,
    progress: Option<&dyn CrawlProgress>,
) -> CrawlReport {
    let mut frontier: Vec<CategoryId> = vec![options.root];
    let mut visited: HashSet<CategoryId> = HashSet::new();
    let mut table = CatalogTable::new();
    let mut failures = Vec::new();
    let mut series_calls = 0;
    let mut children_calls = 0;
    let mut truncated = false;

    while let Some(category) = frontier.pop() {
        if visited.contains(&category) {
            continue;
        }
        if options
            .max_categories
            .is_some_and(|max| visited.len() >= max)
        {
            truncated = true;
            break;
        }
        visited.insert(category);

        series_calls += 1;
        match source.list_series(category) {
            Ok(records) => {
                tracing::debug!(%category, count = records.len(), "listed series");
                table.extend(records);
            }
            Err(e) => {
                record_failure(&mut failures, category, CategoryOperation::ListSeries, &e);
            }
        }

        children_calls += 1;
        match source.list_children(category) {
            Ok(children) => {
                tracing::debug!(%category, count = children.len(), "listed children");
                frontier.extend(children);
            }
            Err(e) => {
                record_failure(&mut failures, category, CategoryOperation::ListChildren, &e);
            }
        }

        if let Some(p) = progress {
            p.on_category(category, visited.len(), frontier.len(), table.len());
        }
    }

    tracing::info!(
        categories = visited.len(),
        records = table.len(),
        failures = failures.len(),
        truncated,
        "catalog crawl complete"
    );

    CrawlReport {
        table,
        visited: visited.len(),
        series_calls,
        children_calls,
        failures,
        truncated,
    }
}

fn record_failure(
    failures: &mut Vec<CategoryFailure>,
    category: CategoryId,
    operation: CategoryOperation,
    error: &DataError,
) {
    tracing::warn!(%category, ?operation, error = %error, "category call failed, treating as empty");
    failures.push(CategoryFailure {
        category,
        operation,
        message: error.to_string(),
    });
}
