//! Input/output modules: retrieval files, region polygons, gridded layers,
//! tabular reports.

pub mod gridded;
pub mod regions;
pub mod report;
pub mod retrieval;

pub use gridded::{GridDatasetBuilder, GridWriter};
pub use regions::RegionReader;
pub use report::ReportWriter;
pub use retrieval::{RetrievalReader, RetrievalSchema};
