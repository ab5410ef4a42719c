//! CSV export of aligned tables and the series catalog.
//!
//! - **Aligned table**: `date` followed by one column per series; one row
//!   per date in ascending order, missing cells empty
//! - **Catalog**: one row per series record with its seven metadata fields

use std::path::Path;

use anyhow::{Context, Result};
use fredscope_core::domain::{AlignedTable, CatalogTable};

/// Default file name for an exported aligned table.
pub const DEFAULT_DATA_FILE: &str = "economic_data.csv";

/// Default file name for an exported catalog.
pub const DEFAULT_CATALOG_FILE: &str = "fred_metadata_catalogue.csv";

pub const CATALOG_COLUMNS: [&str; 7] = [
    "id",
    "title",
    "units",
    "frequency",
    "seasonal_adjustment",
    "last_updated",
    "notes",
];

/// Export an aligned (or normalized) table as CSV.
pub fn export_aligned_csv(table: &AlignedTable) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = Vec::with_capacity(table.column_count() + 1);
    header.push("date");
    header.extend(table.column_names());
    wtr.write_record(&header)?;

    for (date, values) in table.rows() {
        let mut record = Vec::with_capacity(values.len() + 1);
        record.push(date.format("%Y-%m-%d").to_string());
        record.extend(values.iter().map(|v| v.map(|x| x.to_string()).unwrap_or_default()));
        wtr.write_record(&record)?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Export the series catalog as CSV. Missing metadata fields are empty.
pub fn export_catalog_csv(catalog: &CatalogTable) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(CATALOG_COLUMNS)?;

    for r in catalog {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        wtr.write_record([
            r.id.clone(),
            opt(&r.title),
            opt(&r.units),
            opt(&r.frequency),
            opt(&r.seasonal_adjustment),
            opt(&r.last_updated),
            opt(&r.notes),
        ])?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Write `content` to `path`, creating parent directories.
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}
