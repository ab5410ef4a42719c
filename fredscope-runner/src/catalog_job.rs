//! Catalog job: crawl the category tree, optionally collapse cross-listed
//! series, optionally write the CSV.

use std::path::PathBuf;

use anyhow::Result;
use fredscope_core::catalog::{crawl_catalog_with, CrawlOptions, CrawlProgress, CrawlReport};
use fredscope_core::data::CategorySource;

use crate::export::{export_catalog_csv, write_file};

#[derive(Debug, Clone, Default)]
pub struct CatalogJob {
    pub crawl: CrawlOptions,
    /// Keep only the first record per series id.
    pub dedupe: bool,
    /// Write the catalog CSV here when set.
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CatalogJobResult {
    pub report: CrawlReport,
    /// Records in the crawl before deduplication.
    pub raw_records: usize,
    pub written_to: Option<PathBuf>,
}

pub fn run_catalog_job<S: CategorySource + ?Sized>(
    source: &S,
    job: &CatalogJob,
    progress: Option<&dyn CrawlProgress>,
) -> Result<CatalogJobResult> {
    let mut report = crawl_catalog_with(source, &job.crawl, progress);
    let raw_records = report.table.len();

    if job.dedupe {
        report.table = report.table.deduplicated_by_id();
        tracing::info!(
            before = raw_records,
            after = report.table.len(),
            "deduplicated catalog by series id"
        );
    }

    let written_to = match &job.output {
        Some(path) => {
            write_file(path, &export_catalog_csv(&report.table)?)?;
            tracing::info!(path = %path.display(), records = report.table.len(), "catalog written");
            Some(path.clone())
        }
        None => None,
    };

    Ok(CatalogJobResult {
        report,
        raw_records,
        written_to,
    })
}
