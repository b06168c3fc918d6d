//! TraceGrid: A Fast, Modular Trace-Gas Retrieval Gridder
//!
//! This library turns point-wise satellite trace-gas retrievals (e.g. OCO-2
//! XCO2 soundings) into regular-grid concentration layers via k-nearest
//! inverse-distance-weighted interpolation, and reduces those layers to one
//! zonal statistic per administrative region with an explicit degradation
//! path (polygon clip, then centroid nearest-neighbor, then missing).

pub mod core;
pub mod io;
pub mod pipeline;
pub mod types;

// Re-export main types and functions for easier access
pub use types::{
    BoundingBox, GridCell, GridDataset, GridError, GridResult, GridSpec, Region, RegionStat,
    RegionStatus, RetrievalBatch, RetrievalPoint,
};

pub use crate::core::{
    GridInterpolator, IdwGrids, IdwParams, IngestionFilter, IngestionParams, SummaryReporter,
    SummaryStats, ZonalAggregator,
};

pub use io::{GridDatasetBuilder, GridWriter, RegionReader, ReportWriter, RetrievalReader,
    RetrievalSchema};

pub use pipeline::{run, PipelineConfig, RunOutputs};
