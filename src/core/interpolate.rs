use crate::types::{GridError, GridResult, GridSpec, RetrievalPoint};
use ndarray::Array2;
use rayon::prelude::*;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// Distance substituted when a grid node coincides with a source point, so
/// the coincident point dominates the weighted average without a division
/// by zero.
const ZERO_DISTANCE_EPS: f64 = 1e-10;

/// Inverse-distance-weighting parameters
#[derive(Debug, Clone, Copy, serde::Deserialize)]
#[serde(default)]
pub struct IdwParams {
    /// Exponent applied to neighbor distances
    pub power: f64,
    /// Number of nearest neighbors per grid node
    pub k: usize,
}

impl Default for IdwParams {
    fn default() -> Self {
        Self { power: 2.0, k: 10 }
    }
}

/// Value and anomaly grids interpolated from the same neighbor sets and
/// weights, shape (lat, lon).
#[derive(Debug, Clone)]
pub struct IdwGrids {
    pub value: Array2<f64>,
    pub anomaly: Array2<f64>,
}

/// Spatial-index entry: (lon, lat) treated as planar Euclidean coordinates.
///
/// At sub-national scale the planar simplification is acceptable; it mirrors
/// how the retrievals are gridded operationally and is deliberate, not a bug.
#[derive(Debug, Clone)]
struct SamplePoint {
    pos: [f64; 2],
    value: f64,
    anomaly: f64,
}

impl RTreeObject for SamplePoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.pos)
    }
}

impl PointDistance for SamplePoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.pos[0] - point[0];
        let dy = self.pos[1] - point[1];
        dx * dx + dy * dy
    }
}

/// k-nearest-neighbor IDW interpolator over scattered retrieval points.
///
/// The index is immutable after construction; node estimates share it
/// read-only, so the per-node work parallelizes without locks.
pub struct GridInterpolator {
    tree: RTree<SamplePoint>,
    params: IdwParams,
}

impl GridInterpolator {
    /// Build the spatial index over the point set.
    ///
    /// An empty point set is an upstream contract violation and propagates
    /// as `EmptyExtraction`.
    pub fn new(points: &[RetrievalPoint], params: IdwParams) -> GridResult<Self> {
        if points.is_empty() {
            return Err(GridError::EmptyExtraction(
                "cannot build spatial index over zero points".to_string(),
            ));
        }

        let samples: Vec<SamplePoint> = points
            .iter()
            .map(|p| SamplePoint {
                pos: [p.longitude, p.latitude],
                value: p.value,
                anomaly: p.anomaly,
            })
            .collect();

        log::debug!("Building R-tree over {} points", samples.len());
        Ok(Self {
            tree: RTree::bulk_load(samples),
            params,
        })
    }

    /// Estimate the value and anomaly fields at every node of `spec`.
    ///
    /// Both fields use identical neighbor sets and weights per node.
    pub fn interpolate(&self, spec: &GridSpec) -> GridResult<IdwGrids> {
        let lats = spec.lat_values();
        let lons = spec.lon_values();
        let (n_lat, n_lon) = (lats.len(), lons.len());

        log::info!(
            "IDW interpolation onto {}x{} grid (k={}, power={})",
            n_lat,
            n_lon,
            self.params.k,
            self.params.power
        );

        // One output slot per node; rayon workers share the index read-only.
        let estimates: Vec<(f64, f64)> = (0..n_lat * n_lon)
            .into_par_iter()
            .map(|idx| {
                let lat = lats[idx / n_lon];
                let lon = lons[idx % n_lon];
                self.estimate_node(lon, lat)
            })
            .collect();

        let value = Array2::from_shape_vec(
            (n_lat, n_lon),
            estimates.iter().map(|e| e.0).collect(),
        )
        .map_err(|e| GridError::Processing(format!("grid shape error: {}", e)))?;
        let anomaly = Array2::from_shape_vec(
            (n_lat, n_lon),
            estimates.iter().map(|e| e.1).collect(),
        )
        .map_err(|e| GridError::Processing(format!("grid shape error: {}", e)))?;

        Ok(IdwGrids { value, anomaly })
    }

    /// IDW estimate of (value, anomaly) at a single query location.
    fn estimate_node(&self, lon: f64, lat: f64) -> (f64, f64) {
        let query = [lon, lat];

        let mut weights = Vec::with_capacity(self.params.k);
        let mut weight_sum = 0.0;
        for (sample, d2) in self
            .tree
            .nearest_neighbor_iter_with_distance_2(&query)
            .take(self.params.k)
        {
            let dist = d2.sqrt().max(ZERO_DISTANCE_EPS);
            let w = 1.0 / dist.powf(self.params.power);
            weight_sum += w;
            weights.push((w, sample.value, sample.anomaly));
        }

        // Normalized so the weights sum to exactly 1 over the neighbor set
        let mut value = 0.0;
        let mut anomaly = 0.0;
        for (w, v, a) in weights {
            value += w / weight_sum * v;
            anomaly += w / weight_sum * a;
        }
        (value, anomaly)
    }
}
