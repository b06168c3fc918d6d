use crate::types::{BoundingBox, GridError, GridResult, RetrievalBatch, RetrievalPoint};

/// Unit scale from the native fractional mixing ratio to parts-per-million
pub const PPM_SCALE: f64 = 1e6;

/// Ingestion-stage parameters
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct IngestionParams {
    /// Multiplier applied to the raw retrieval value before any other step
    pub unit_scale: f64,
    /// Points outside this rectangle are dropped after all batches merge
    pub bounds: BoundingBox,
}

impl Default for IngestionParams {
    fn default() -> Self {
        Self {
            unit_scale: PPM_SCALE,
            bounds: BoundingBox {
                min_lon: 90.0,
                max_lon: 145.0,
                min_lat: -15.0,
                max_lat: 30.0,
            },
        }
    }
}

/// Flattens raw retrieval batches into a bias-corrected, spatially bounded
/// point list.
pub struct IngestionFilter {
    params: IngestionParams,
}

impl IngestionFilter {
    pub fn new() -> Self {
        Self {
            params: IngestionParams::default(),
        }
    }

    pub fn with_params(params: IngestionParams) -> Self {
        Self { params }
    }

    /// Convert batches to points: scale to ppm, compute the per-batch median
    /// and each point's anomaly against it, merge, then apply the bounding
    /// filter.
    ///
    /// Fails with `DataAbsent` when `batches` is empty and `EmptyExtraction`
    /// when nothing survives the bounding filter.
    pub fn extract_points(&self, batches: &[RetrievalBatch]) -> GridResult<Vec<RetrievalPoint>> {
        if batches.is_empty() {
            return Err(GridError::DataAbsent(
                "no retrieval batches to ingest".to_string(),
            ));
        }

        let mut points = Vec::new();
        for (i, batch) in batches.iter().enumerate() {
            let batch_points = self.extract_batch(i, batch)?;
            log::debug!("Batch {}: {} soundings", i, batch_points.len());
            points.extend(batch_points);
        }

        let total = points.len();
        points.retain(|p| self.params.bounds.contains(p.latitude, p.longitude));
        log::info!(
            "Ingested {} soundings from {} batch(es), {} inside bounds",
            total,
            batches.len(),
            points.len()
        );

        if points.is_empty() {
            return Err(GridError::EmptyExtraction(format!(
                "{} soundings extracted, none inside lat [{}, {}] lon [{}, {}]",
                total,
                self.params.bounds.min_lat,
                self.params.bounds.max_lat,
                self.params.bounds.min_lon,
                self.params.bounds.max_lon
            )));
        }

        Ok(points)
    }

    /// Flatten one batch to points. The anomaly of every point references the
    /// median of this batch only.
    fn extract_batch(&self, index: usize, batch: &RetrievalBatch) -> GridResult<Vec<RetrievalPoint>> {
        let n = batch.values.len();
        if batch.latitudes.len() != n || batch.longitudes.len() != n {
            return Err(GridError::InvalidFormat(format!(
                "batch {}: array length mismatch: values={}, lat={}, lon={}",
                index,
                n,
                batch.latitudes.len(),
                batch.longitudes.len()
            )));
        }
        if n == 0 {
            return Ok(Vec::new());
        }

        let scaled: Vec<f64> = batch
            .values
            .iter()
            .map(|v| v * self.params.unit_scale)
            .collect();
        let med = median(&scaled);

        let points = scaled
            .iter()
            .zip(batch.latitudes.iter())
            .zip(batch.longitudes.iter())
            .map(|((&value, &latitude), &longitude)| RetrievalPoint {
                latitude,
                longitude,
                value,
                anomaly: value - med,
            })
            .collect();

        Ok(points)
    }
}

impl Default for IngestionFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Median of a non-empty slice; for even counts, the mean of the two middle
/// elements.
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn batch(values: &[f64], lats: &[f64], lons: &[f64]) -> RetrievalBatch {
        RetrievalBatch {
            values: values.to_vec(),
            latitudes: lats.to_vec(),
            longitudes: lons.to_vec(),
        }
    }

    #[test]
    fn test_median_odd_even() {
        assert_relative_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_relative_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_relative_eq!(median(&[5.0]), 5.0);
    }

    #[test]
    fn test_anomaly_is_value_minus_batch_median() {
        let filter = IngestionFilter::new();
        // Raw fractions; scaled values are 400, 410, 420 ppm, median 410
        let b = batch(
            &[400e-6, 410e-6, 420e-6],
            &[0.0, 1.0, 2.0],
            &[100.0, 101.0, 102.0],
        );
        let points = filter.extract_points(&[b]).unwrap();
        assert_eq!(points.len(), 3);
        for p in &points {
            assert_relative_eq!(p.anomaly, p.value - 410.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_anomaly_uses_own_batch_median() {
        let filter = IngestionFilter::new();
        let b1 = batch(&[400e-6], &[0.0], &[100.0]);
        let b2 = batch(&[500e-6], &[1.0], &[101.0]);
        let points = filter.extract_points(&[b1, b2]).unwrap();
        // Each batch has a single sounding, so both anomalies are zero
        assert_relative_eq!(points[0].anomaly, 0.0);
        assert_relative_eq!(points[1].anomaly, 0.0);
    }

    #[test]
    fn test_bounding_filter_drops_outside_points() {
        let filter = IngestionFilter::new();
        let b = batch(
            &[400e-6, 410e-6, 420e-6],
            &[0.0, 60.0, -40.0],
            &[100.0, 100.0, 100.0],
        );
        let points = filter.extract_points(&[b]).unwrap();
        assert_eq!(points.len(), 1);
        assert_relative_eq!(points[0].latitude, 0.0);
    }

    #[test]
    fn test_no_batches_is_data_absent() {
        let filter = IngestionFilter::new();
        match filter.extract_points(&[]) {
            Err(GridError::DataAbsent(_)) => {}
            other => panic!("expected DataAbsent, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_all_filtered_is_empty_extraction() {
        let filter = IngestionFilter::new();
        let b = batch(&[400e-6], &[60.0], &[10.0]);
        match filter.extract_points(&[b]) {
            Err(GridError::EmptyExtraction(_)) => {}
            other => panic!("expected EmptyExtraction, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_length_mismatch_is_invalid_format() {
        let filter = IngestionFilter::new();
        let b = batch(&[400e-6, 410e-6], &[0.0], &[100.0]);
        assert!(matches!(
            filter.extract_points(&[b]),
            Err(GridError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_length_mismatch_names_batch_once() {
        let filter = IngestionFilter::new();
        let good = batch(&[400e-6], &[0.0], &[100.0]);
        let bad = batch(&[400e-6, 410e-6], &[0.0], &[100.0]);
        let err = filter.extract_points(&[good, bad]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("batch 1"), "message was: {}", msg);
        assert_eq!(
            msg.matches("invalid data format").count(),
            1,
            "message was: {}",
            msg
        );
    }
}
