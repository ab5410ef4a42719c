//! Fredscope Runner — configuration, series loading, requests, catalog job,
//! CSV export.
//!
//! This crate builds on `fredscope-core` to provide:
//! - TOML configuration with built-in region → series maps
//! - Cache-first series loading, sequential or on a bounded rayon pool
//! - The dashboard request pipeline (select, load, align, normalize)
//! - The catalog crawl job with optional dedupe and CSV output
//! - CSV export of aligned tables and catalogs

pub mod catalog_job;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;

pub use catalog_job::{run_catalog_job, CatalogJob, CatalogJobResult};
pub use config::{
    default_regions, resolve_api_key, resolve_date_range, ApiSettings, AppConfig, CacheSettings,
    ConfigError, FetchMode, FetchModeKind, FetchSettings, Region, SeriesEntry,
};
pub use data_loader::{load_one, load_series, LoadOptions, LoadSource};
pub use export::{export_aligned_csv, export_catalog_csv, write_file};
pub use runner::{align_loaded, run_series_request, RequestError, SeriesRequest, SeriesResponse};
