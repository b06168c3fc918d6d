use chrono::NaiveDate;
use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

/// One satellite sounding after unit scaling and bias correction.
///
/// `anomaly` is the value minus the median of the sounding's own ingestion
/// batch; it is computed once at ingestion and never recomputed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Trace-gas concentration in ppm
    pub value: f64,
    /// Deviation from the batch median in ppm
    pub anomaly: f64,
}

/// One raw retrieval batch: three elementwise-aligned arrays as read from a
/// retrieval file, values still in their native fractional unit.
#[derive(Debug, Clone)]
pub struct RetrievalBatch {
    pub values: Vec<f64>,
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

/// Regular lat/lon grid definition, inclusive of both bounds on each axis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GridSpec {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    /// Node spacing in degrees, identical on both axes
    pub resolution: f64,
}

impl GridSpec {
    /// Number of nodes along the latitude axis
    pub fn n_lat(&self) -> usize {
        ((self.lat_max - self.lat_min) / self.resolution).round() as usize + 1
    }

    /// Number of nodes along the longitude axis
    pub fn n_lon(&self) -> usize {
        ((self.lon_max - self.lon_min) / self.resolution).round() as usize + 1
    }

    /// Latitude node coordinates, monotonically increasing
    pub fn lat_values(&self) -> Vec<f64> {
        (0..self.n_lat())
            .map(|i| self.lat_min + i as f64 * self.resolution)
            .collect()
    }

    /// Longitude node coordinates, monotonically increasing
    pub fn lon_values(&self) -> Vec<f64> {
        (0..self.n_lon())
            .map(|i| self.lon_min + i as f64 * self.resolution)
            .collect()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox {
            min_lon: self.lon_min,
            max_lon: self.lon_max,
            min_lat: self.lat_min,
            max_lat: self.lat_max,
        }
    }

    /// Check the spec is usable: positive resolution and ordered bounds.
    ///
    /// Deserialized configs are not trusted; a zero resolution would
    /// overflow the node counts.
    pub fn validate(&self) -> GridResult<()> {
        if !(self.resolution > 0.0) {
            return Err(GridError::InvalidFormat(format!(
                "grid resolution must be positive, got {}",
                self.resolution
            )));
        }
        if self.lat_max < self.lat_min || self.lon_max < self.lon_min {
            return Err(GridError::InvalidFormat(format!(
                "grid bounds are inverted: lat [{}, {}], lon [{}, {}]",
                self.lat_min, self.lat_max, self.lon_min, self.lon_max
            )));
        }
        Ok(())
    }
}

impl Default for GridSpec {
    /// Operational 0.5 degree grid over the Indonesian region
    fn default() -> Self {
        Self {
            lat_min: -15.0,
            lat_max: 30.0,
            lon_min: 90.0,
            lon_max: 145.0,
            resolution: 0.5,
        }
    }
}

/// One interpolated grid node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    pub lat: f64,
    pub lon: f64,
    pub value: f64,
}

/// Administrative region with its polygon geometry (EPSG:4326)
#[derive(Debug, Clone)]
pub struct Region {
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

/// Confidence level of a zonal statistic, in strict fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionStatus {
    /// Mean over grid cells inside the region polygon
    Computed,
    /// Single nearest grid node to the polygon centroid
    CentroidFallback,
    /// No estimate could be produced
    Missing,
}

impl std::fmt::Display for RegionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegionStatus::Computed => write!(f, "computed"),
            RegionStatus::CentroidFallback => write!(f, "centroid-fallback"),
            RegionStatus::Missing => write!(f, "missing"),
        }
    }
}

/// Zonal statistic for one region in one monthly run
#[derive(Debug, Clone)]
pub struct RegionStat {
    pub region_name: String,
    pub year: i32,
    pub month: u32,
    /// NaN when `status` is `Missing`
    pub value: f64,
    pub status: RegionStatus,
}

impl RegionStat {
    pub fn is_valid(&self) -> bool {
        self.status != RegionStatus::Missing
    }
}

/// A self-describing single-time-slice gridded layer, ready for raster
/// consumption (CF-1.6 NetCDF).
#[derive(Debug, Clone)]
pub struct GridDataset {
    /// Variable name, e.g. "co2"
    pub name: String,
    /// Descriptive name, e.g. "CO2 mixing ratio"
    pub long_name: String,
    /// Physical units of the data variable
    pub units: String,
    /// Nominal date of the batch (single time coordinate)
    pub time: NaiveDate,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    /// Row-major (lat, lon) data
    pub data: ndarray::Array2<f64>,
}

impl GridDataset {
    /// Iterate the layer as one `GridCell` per node, row-major by latitude.
    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        self.lat.iter().enumerate().flat_map(move |(i, &lat)| {
            self.lon.iter().enumerate().map(move |(j, &lon)| GridCell {
                lat,
                lon,
                value: self.data[[i, j]],
            })
        })
    }
}

/// Error types for the gridding pipeline
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no retrieval input found: {0}")]
    DataAbsent(String),

    #[error("no usable points after extraction and filtering: {0}")]
    EmptyExtraction(String),

    #[error("every region ended without a valid statistic")]
    NoValidRegions,

    #[error("invalid data format: {0}")]
    InvalidFormat(String),

    #[error("processing error: {0}")]
    Processing(String),

    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for pipeline operations
pub type GridResult<T> = Result<T, GridError>;
