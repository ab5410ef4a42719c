//! Fredscope Core — domain types, FRED access, catalog crawling, and series
//! alignment.
//!
//! This crate contains:
//! - Domain types (series records, observations, aligned tables)
//! - Collaborator traits for the remote data API, plus the FRED client
//! - On-disk Parquet cache for fetched series
//! - Catalog crawler over the category tree
//! - N-ary date alignment and z-score normalization

pub mod catalog;
pub mod data;
pub mod domain;
pub mod pipeline;

pub use pipeline::{align_and_normalize, AlignmentOutcome, FetchedSeries, PipelineError};
