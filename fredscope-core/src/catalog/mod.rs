//! Catalog discovery: walk the category tree and flatten every series record
//! it lists.

pub mod crawler;
pub mod memory;

pub use crawler::{
    crawl_catalog, crawl_catalog_with, CategoryFailure, CategoryOperation, CrawlOptions,
    CrawlProgress, CrawlReport, LogCrawlProgress,
};
pub use memory::InMemoryCatalog;
