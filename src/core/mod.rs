//! Core gridding and aggregation modules

pub mod ingest;
pub mod interpolate;
pub mod summary;
pub mod zonal;

// Re-export main types
pub use ingest::{IngestionFilter, IngestionParams};
pub use interpolate::{GridInterpolator, IdwGrids, IdwParams};
pub use summary::{SummaryReporter, SummaryStats};
pub use zonal::ZonalAggregator;
