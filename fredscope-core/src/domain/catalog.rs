//! Catalog metadata produced by the category crawl.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Metadata for one series as listed under a category.
///
/// Identity is `id` only. Every other field is whatever the source reported,
/// and any of them may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesRecord {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub seasonal_adjustment: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SeriesRecord {
    /// A record carrying only its id.
    pub fn bare(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            units: None,
            frequency: None,
            seasonal_adjustment: None,
            last_updated: None,
            notes: None,
        }
    }
}

/// Flat catalog in discovery order.
///
/// A series cross-listed under several categories appears once per listing.
/// Use [`CatalogTable::deduplicated_by_id`] for a one-row-per-series view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTable {
    records: Vec<SeriesRecord>,
}

impl CatalogTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: SeriesRecord) {
        self.records.push(record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = SeriesRecord>) {
        self.records.extend(records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[SeriesRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SeriesRecord> {
        self.records.iter()
    }

    /// Number of distinct series ids in the table.
    pub fn distinct_ids(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// New table keeping the first occurrence of each id, order preserved.
    pub fn deduplicated_by_id(&self) -> CatalogTable {
        let mut seen = HashSet::new();
        let records = self
            .records
            .iter()
            .filter(|r| seen.insert(r.id.as_str()))
            .cloned()
            .collect();
        CatalogTable { records }
    }

    pub fn into_records(self) -> Vec<SeriesRecord> {
        self.records
    }
}

impl FromIterator<SeriesRecord> for CatalogTable {
    fn from_iter<I: IntoIterator<Item = SeriesRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CatalogTable {
    type Item = &'a SeriesRecord;
    type IntoIter = std::slice::Iter<'a, SeriesRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titled(id: &str, title: &str) -> SeriesRecord {
        SeriesRecord {
            title: Some(title.into()),
            ..SeriesRecord::bare(id)
        }
    }

    #[test]
    fn preserves_discovery_order_and_multiplicity() {
        let table: CatalogTable = vec![
            titled("UNRATE", "Unemployment Rate"),
            titled("GDPC1", "Real GDP"),
            titled("UNRATE", "Unemployment Rate"),
        ]
        .into_iter()
        .collect();

        assert_eq!(table.len(), 3);
        assert_eq!(table.distinct_ids(), 2);
        let ids: Vec<&str> = table.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["UNRATE", "GDPC1", "UNRATE"]);
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let table: CatalogTable = vec![
            titled("UNRATE", "first"),
            titled("GDPC1", "Real GDP"),
            titled("UNRATE", "second"),
        ]
        .into_iter()
        .collect();

        let deduped = table.deduplicated_by_id();
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped.records()[0].title.as_deref(), Some("first"));
        assert_eq!(deduped.records()[1].id, "GDPC1");
        // source table untouched
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn record_deserializes_with_missing_fields() {
        let record: SeriesRecord =
            serde_json::from_str(r#"{"id":"MOUR","title":"Unemployment Rate in Missouri"}"#)
                .unwrap();
        assert_eq!(record.id, "MOUR");
        assert!(record.units.is_none());
        assert!(record.notes.is_none());
    }
}
