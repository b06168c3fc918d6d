use crate::types::{GridDataset, GridResult, Region, RegionStat, RegionStatus};
use chrono::Datelike;
use geo::{Centroid, Contains, Point};
use rayon::prelude::*;

/// Stage at which a region's estimate degraded, for logging only.
#[derive(Debug, Clone, Copy)]
enum FallbackStage {
    Clip,
    Centroid,
}

impl std::fmt::Display for FallbackStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackStage::Clip => write!(f, "polygon clip"),
            FallbackStage::Centroid => write!(f, "centroid lookup"),
        }
    }
}

/// Reduces a gridded layer to one statistic per region polygon.
///
/// Each region is a pure function of (region, grid): clip mean first, then
/// the nearest grid node to the polygon centroid, then missing. A fallback
/// never retries an earlier, higher-confidence stage, and no failure here is
/// fatal to the run.
pub struct ZonalAggregator<'a> {
    dataset: &'a GridDataset,
}

impl<'a> ZonalAggregator<'a> {
    pub fn new(dataset: &'a GridDataset) -> Self {
        Self { dataset }
    }

    /// Aggregate every region independently. Output order matches input
    /// order regardless of worker scheduling.
    pub fn aggregate_all(&self, regions: &[Region]) -> GridResult<Vec<RegionStat>> {
        log::info!(
            "Zonal aggregation of '{}' over {} regions",
            self.dataset.name,
            regions.len()
        );
        let stats: Vec<RegionStat> = regions.par_iter().map(|r| self.aggregate(r)).collect();

        let missing = stats.iter().filter(|s| !s.is_valid()).count();
        if missing > 0 {
            log::warn!("{} of {} regions ended missing", missing, regions.len());
        }
        Ok(stats)
    }

    /// Reduce one region to a statistic, degrading through the fallback
    /// chain as needed.
    pub fn aggregate(&self, region: &Region) -> RegionStat {
        log::debug!("Processing region: {}", region.name);

        let (value, status) = match self.clip_mean(region) {
            Some(mean) => (mean, RegionStatus::Computed),
            None => {
                self.log_fallback(region, FallbackStage::Clip);
                match self.centroid_value(region) {
                    Some(v) => (v, RegionStatus::CentroidFallback),
                    None => {
                        self.log_fallback(region, FallbackStage::Centroid);
                        (f64::NAN, RegionStatus::Missing)
                    }
                }
            }
        };

        RegionStat {
            region_name: region.name.clone(),
            year: self.dataset.time.year(),
            month: self.dataset.time.month(),
            value,
            status,
        }
    }

    /// Mean of finite grid cells inside the region polygon, or None when the
    /// clip yields no usable cell.
    fn clip_mean(&self, region: &Region) -> Option<f64> {
        let mut sum = 0.0;
        let mut count = 0usize;

        for cell in self.dataset.cells() {
            if !cell.value.is_finite() {
                continue;
            }
            if region.geometry.contains(&Point::new(cell.lon, cell.lat)) {
                sum += cell.value;
                count += 1;
            }
        }

        (count > 0).then(|| sum / count as f64)
    }

    /// Value of the grid node nearest the polygon centroid, or None when the
    /// centroid is undefined, falls outside the grid extent, or lands on a
    /// non-finite cell.
    fn centroid_value(&self, region: &Region) -> Option<f64> {
        let centroid = region.geometry.centroid()?;
        let i = nearest_axis_index(&self.dataset.lat, centroid.y())?;
        let j = nearest_axis_index(&self.dataset.lon, centroid.x())?;
        let v = self.dataset.data[[i, j]];
        v.is_finite().then_some(v)
    }

    fn log_fallback(&self, region: &Region, stage: FallbackStage) {
        log::warn!(
            "Region '{}': {} produced no data, falling back",
            region.name,
            stage
        );
    }
}

/// Index of the axis coordinate nearest `target`, as long as the target is
/// within half a step of the axis range. Axis values are evenly spaced and
/// monotonically increasing.
fn nearest_axis_index(axis: &[f64], target: f64) -> Option<usize> {
    if axis.is_empty() {
        return None;
    }
    let step = if axis.len() > 1 {
        axis[1] - axis[0]
    } else {
        1.0
    };
    if target < axis[0] - step / 2.0 || target > axis[axis.len() - 1] + step / 2.0 {
        return None;
    }
    let idx = ((target - axis[0]) / step).round() as usize;
    Some(idx.min(axis.len() - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GridDataset;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use geo::{polygon, MultiPolygon};
    use ndarray::Array2;

    fn dataset() -> GridDataset {
        // 3x3 grid: lat [0, 1, 2], lon [100, 101, 102], value = lat*10 + (lon-100)
        let lat = vec![0.0, 1.0, 2.0];
        let lon = vec![100.0, 101.0, 102.0];
        let data = Array2::from_shape_fn((3, 3), |(i, j)| i as f64 * 10.0 + j as f64);
        GridDataset {
            name: "co2".to_string(),
            long_name: "CO2 mixing ratio".to_string(),
            units: "ppm".to_string(),
            time: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            lat,
            lon,
            data,
        }
    }

    fn region(name: &str, poly: geo::Polygon<f64>) -> Region {
        Region {
            name: name.to_string(),
            geometry: MultiPolygon::new(vec![poly]),
        }
    }

    #[test]
    fn test_contained_cells_yield_computed_mean() {
        let ds = dataset();
        let agg = ZonalAggregator::new(&ds);
        // Covers the four nodes (0,100) (0,101) (1,100) (1,101): 0, 1, 10, 11
        let r = region(
            "inner",
            polygon![
                (x: 99.5, y: -0.5),
                (x: 101.5, y: -0.5),
                (x: 101.5, y: 1.5),
                (x: 99.5, y: 1.5),
            ],
        );
        let stat = agg.aggregate(&r);
        assert_eq!(stat.status, RegionStatus::Computed);
        assert_relative_eq!(stat.value, 5.5);
        assert_eq!(stat.year, 2025);
        assert_eq!(stat.month, 4);
    }

    #[test]
    fn test_no_overlap_never_computed() {
        let ds = dataset();
        let agg = ZonalAggregator::new(&ds);
        // Entirely outside the grid extent, centroid near (50, 50)
        let r = region(
            "faraway",
            polygon![
                (x: 49.0, y: 49.0),
                (x: 51.0, y: 49.0),
                (x: 51.0, y: 51.0),
                (x: 49.0, y: 51.0),
            ],
        );
        let stat = agg.aggregate(&r);
        assert_ne!(stat.status, RegionStatus::Computed);
        assert_eq!(stat.status, RegionStatus::Missing);
        assert!(stat.value.is_nan());
    }

    #[test]
    fn test_small_polygon_falls_back_to_centroid() {
        let ds = dataset();
        let agg = ZonalAggregator::new(&ds);
        // Contains no grid node, centroid near (100.5, 0.4) -> nearest (0, 100) or (0, 101)
        let r = region(
            "sliver",
            polygon![
                (x: 100.3, y: 0.3),
                (x: 100.45, y: 0.3),
                (x: 100.45, y: 0.45),
                (x: 100.3, y: 0.45),
            ],
        );
        let stat = agg.aggregate(&r);
        assert_eq!(stat.status, RegionStatus::CentroidFallback);
        // Centroid (100.375, 0.375) -> node (lat 0, lon 100) -> 0.0
        assert_relative_eq!(stat.value, 0.0);
    }

    #[test]
    fn test_centroid_on_nan_cell_is_missing() {
        let mut ds = dataset();
        ds.data[[0, 0]] = f64::NAN;
        let agg = ZonalAggregator::new(&ds);
        let r = region(
            "sliver",
            polygon![
                (x: 100.1, y: 0.1),
                (x: 100.2, y: 0.1),
                (x: 100.2, y: 0.2),
                (x: 100.1, y: 0.2),
            ],
        );
        let stat = agg.aggregate(&r);
        assert_eq!(stat.status, RegionStatus::Missing);
    }

    #[test]
    fn test_nan_cells_excluded_from_clip_mean() {
        let mut ds = dataset();
        ds.data[[0, 0]] = f64::NAN;
        let agg = ZonalAggregator::new(&ds);
        let r = region(
            "inner",
            polygon![
                (x: 99.5, y: -0.5),
                (x: 101.5, y: -0.5),
                (x: 101.5, y: 1.5),
                (x: 99.5, y: 1.5),
            ],
        );
        let stat = agg.aggregate(&r);
        assert_eq!(stat.status, RegionStatus::Computed);
        // Remaining cells: 1, 10, 11
        assert_relative_eq!(stat.value, 22.0 / 3.0);
    }

    #[test]
    fn test_aggregate_all_preserves_region_order() {
        let ds = dataset();
        let agg = ZonalAggregator::new(&ds);
        let regions = vec![
            region(
                "b",
                polygon![
                    (x: 99.5, y: -0.5),
                    (x: 102.5, y: -0.5),
                    (x: 102.5, y: 2.5),
                    (x: 99.5, y: 2.5),
                ],
            ),
            region(
                "a",
                polygon![
                    (x: 49.0, y: 49.0),
                    (x: 51.0, y: 49.0),
                    (x: 51.0, y: 51.0),
                    (x: 49.0, y: 51.0),
                ],
            ),
        ];
        let stats = agg.aggregate_all(&regions).unwrap();
        assert_eq!(stats[0].region_name, "b");
        assert_eq!(stats[1].region_name, "a");
    }

    #[test]
    fn test_nearest_axis_index_tolerance() {
        let axis = vec![0.0, 0.5, 1.0];
        assert_eq!(nearest_axis_index(&axis, 0.6), Some(1));
        assert_eq!(nearest_axis_index(&axis, 1.2), Some(2));
        assert_eq!(nearest_axis_index(&axis, 1.3), None);
        assert_eq!(nearest_axis_index(&axis, -0.3), None);
    }
}
