//! In-memory category graph.
//!
//! Backs offline runs and tests: categories, their series and their children
//! are declared up front, and every call is counted so traversal bounds can
//! be asserted.

use crate::data::provider::{CategorySource, DataError};
use crate::domain::{CategoryId, SeriesRecord};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    series: HashMap<CategoryId, Vec<SeriesRecord>>,
    children: HashMap<CategoryId, Vec<CategoryId>>,
    failing_series: HashSet<CategoryId>,
    failing_children: HashSet<CategoryId>,
    series_calls: Mutex<HashMap<CategoryId, usize>>,
    children_calls: Mutex<HashMap<CategoryId, usize>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_children(mut self, parent: u32, children: &[u32]) -> Self {
        self.children
            .entry(CategoryId(parent))
            .or_default()
            .extend(children.iter().copied().map(CategoryId));
        self
    }

    /// Attach bare records (id only) to a category.
    pub fn with_series(self, category: u32, ids: &[&str]) -> Self {
        let records = ids.iter().map(|id| SeriesRecord::bare(*id)).collect();
        self.with_records(category, records)
    }

    pub fn with_records(mut self, category: u32, records: Vec<SeriesRecord>) -> Self {
        self.series
            .entry(CategoryId(category))
            .or_default()
            .extend(records);
        self
    }

    /// Both calls for this category fail.
    pub fn failing(self, category: u32) -> Self {
        self.failing_series(category).failing_children(category)
    }

    pub fn failing_series(mut self, category: u32) -> Self {
        self.failing_series.insert(CategoryId(category));
        self
    }

    pub fn failing_children(mut self, category: u32) -> Self {
        self.failing_children.insert(CategoryId(category));
        self
    }

    pub fn series_calls(&self, category: CategoryId) -> usize {
        count(&self.series_calls, category)
    }

    pub fn children_calls(&self, category: CategoryId) -> usize {
        count(&self.children_calls, category)
    }

    /// Total remote calls of either kind.
    pub fn total_calls(&self) -> usize {
        total(&self.series_calls) + total(&self.children_calls)
    }

    /// Number of distinct categories reachable from `root`.
    pub fn reachable_from(&self, root: CategoryId) -> usize {
        let mut seen = HashSet::new();
        let mut stack = vec![root];
        while let Some(c) = stack.pop() {
            if seen.insert(c) && !self.failing_children.contains(&c) {
                stack.extend(self.children.get(&c).into_iter().flatten().copied());
            }
        }
        seen.len()
    }
}

fn bump(calls: &Mutex<HashMap<CategoryId, usize>>, category: CategoryId) {
    let mut calls = calls.lock().unwrap_or_else(|e| e.into_inner());
    *calls.entry(category).or_default() += 1;
}

fn count(calls: &Mutex<HashMap<CategoryId, usize>>, category: CategoryId) -> usize {
    let calls = calls.lock().unwrap_or_else(|e| e.into_inner());
    calls.get(&category).copied().unwrap_or(0)
}

fn total(calls: &Mutex<HashMap<CategoryId, usize>>) -> usize {
    let calls = calls.lock().unwrap_or_else(|e| e.into_inner());
    calls.values().sum()
}

impl CategorySource for InMemoryCatalog {
    fn list_series(&self, category: CategoryId) -> Result<Vec<SeriesRecord>, DataError> {
        bump(&self.series_calls, category);
        if self.failing_series.contains(&category) {
            return Err(DataError::NetworkUnreachable(format!(
                "category {category} unavailable"
            )));
        }
        Ok(self.series.get(&category).cloned().unwrap_or_default())
    }

    fn list_children(&self, category: CategoryId) -> Result<Vec<CategoryId>, DataError> {
        bump(&self.children_calls, category);
        if self.failing_children.contains(&category) {
            return Err(DataError::NetworkUnreachable(format!(
                "category {category} unavailable"
            )));
        }
        Ok(self.children.get(&category).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_category_is_empty_not_an_error() {
        let c = InMemoryCatalog::new();
        assert!(c.list_series(CategoryId(42)).unwrap().is_empty());
        assert!(c.list_children(CategoryId(42)).unwrap().is_empty());
        assert_eq!(c.total_calls(), 2);
    }

    #[test]
    fn reachable_counts_shared_nodes_once() {
        let c = InMemoryCatalog::new()
            .with_children(0, &[1, 2])
            .with_children(1, &[3])
            .with_children(2, &[3, 0]);
        assert_eq!(c.reachable_from(CategoryId::ROOT), 4);
    }
}
