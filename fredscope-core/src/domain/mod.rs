//! Domain types for FredScope

pub mod catalog;
pub mod ids;
pub mod series;

pub use catalog::{CatalogTable, SeriesRecord};
pub use ids::{CategoryId, DataHash};
pub use series::{
    AlignedColumn, AlignedTable, FailureDescriptor, NormalizedTable, ObservationPoint,
    SeriesColumn,
};
