use crate::types::{GridError, GridResult, RegionStat};

/// Run-level aggregates over the valid (non-missing) region statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryStats {
    pub mean: f64,
    pub min_value: f64,
    pub min_region: String,
    pub max_value: f64,
    pub max_region: String,
}

/// Computes the global mean/min/max across region statistics.
pub struct SummaryReporter;

impl SummaryReporter {
    /// Reduce the region statistics to run-level aggregates.
    ///
    /// Missing regions are excluded. Fails with `NoValidRegions` when every
    /// region is missing, since no aggregate can be formed.
    pub fn summarize(stats: &[RegionStat]) -> GridResult<SummaryStats> {
        let valid: Vec<&RegionStat> = stats.iter().filter(|s| s.is_valid()).collect();
        if valid.is_empty() {
            return Err(GridError::NoValidRegions);
        }

        let mean = valid.iter().map(|s| s.value).sum::<f64>() / valid.len() as f64;

        let mut min = valid[0];
        let mut max = valid[0];
        for s in &valid[1..] {
            if s.value < min.value {
                min = s;
            }
            if s.value > max.value {
                max = s;
            }
        }

        log::info!(
            "Summary: mean {:.2}, max {:.2} in {}, min {:.2} in {}",
            mean,
            max.value,
            max.region_name,
            min.value,
            min.region_name
        );

        Ok(SummaryStats {
            mean,
            min_value: min.value,
            min_region: min.region_name.clone(),
            max_value: max.value,
            max_region: max.region_name.clone(),
        })
    }
}
