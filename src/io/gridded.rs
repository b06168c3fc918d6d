use crate::types::{GridDataset, GridError, GridResult, GridSpec};
use chrono::NaiveDate;
use ndarray::Array2;
use std::path::Path;

/// Packages an interpolated grid plus axis metadata into a self-describing
/// single-time-slice layer. Purely structural.
pub struct GridDatasetBuilder {
    spec: GridSpec,
    time: NaiveDate,
}

impl GridDatasetBuilder {
    pub fn new(spec: GridSpec, time: NaiveDate) -> Self {
        Self { spec, time }
    }

    /// Wrap a (lat, lon) data array with coordinate arrays and field
    /// metadata. The array shape must match the grid spec.
    pub fn build(
        &self,
        name: impl Into<String>,
        long_name: impl Into<String>,
        data: Array2<f64>,
    ) -> GridResult<GridDataset> {
        let expected = (self.spec.n_lat(), self.spec.n_lon());
        if data.dim() != expected {
            return Err(GridError::Processing(format!(
                "grid shape {:?} does not match spec {:?}",
                data.dim(),
                expected
            )));
        }

        Ok(GridDataset {
            name: name.into(),
            long_name: long_name.into(),
            units: "ppm".to_string(),
            time: self.time,
            lat: self.spec.lat_values(),
            lon: self.spec.lon_values(),
            data,
        })
    }
}

/// CF-1.6 NetCDF writer for gridded layers
pub struct GridWriter;

impl GridWriter {
    /// Persist one gridded layer with dims (time=1, lat, lon).
    ///
    /// Coordinate variables are written as f32 with axis identity and degree
    /// units and carry no fill-value marker; the data variable carries its
    /// units and long_name; the dataset declares a title and CF-1.6
    /// conventions.
    pub fn write<P: AsRef<Path>>(dataset: &GridDataset, path: P, title: &str) -> GridResult<()> {
        let path = path.as_ref();
        log::info!("Writing gridded layer '{}' to {}", dataset.name, path.display());

        let (n_lat, n_lon) = dataset.data.dim();
        let mut nc = netcdf::create(path)?;
        nc.add_dimension("time", 1)?;
        nc.add_dimension("lat", n_lat)?;
        nc.add_dimension("lon", n_lon)?;

        {
            let mut time = nc.add_variable::<f64>("time", &["time"])?;
            time.put_attribute("units", "days since 1970-01-01 00:00:00")?;
            time.put_attribute("calendar", "standard")?;
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
                .ok_or_else(|| GridError::Processing("invalid epoch".to_string()))?;
            let days = dataset.time.signed_duration_since(epoch).num_days() as f64;
            time.put_values(&[days], ..)?;
        }

        {
            let mut lat = nc.add_variable::<f32>("lat", &["lat"])?;
            lat.put_attribute("standard_name", "latitude")?;
            lat.put_attribute("units", "degrees_north")?;
            lat.put_attribute("axis", "Y")?;
            let vals: Vec<f32> = dataset.lat.iter().map(|&v| v as f32).collect();
            lat.put_values(&vals, ..)?;
        }

        {
            let mut lon = nc.add_variable::<f32>("lon", &["lon"])?;
            lon.put_attribute("standard_name", "longitude")?;
            lon.put_attribute("units", "degrees_east")?;
            lon.put_attribute("axis", "X")?;
            let vals: Vec<f32> = dataset.lon.iter().map(|&v| v as f32).collect();
            lon.put_values(&vals, ..)?;
        }

        {
            let mut var = nc.add_variable::<f64>(&dataset.name, &["time", "lat", "lon"])?;
            var.put_attribute("units", dataset.units.as_str())?;
            var.put_attribute("long_name", dataset.long_name.as_str())?;
            let flat = dataset
                .data
                .as_slice()
                .ok_or_else(|| GridError::Processing("grid not contiguous".to_string()))?;
            var.put_values(flat, ..)?;
        }

        nc.add_attribute("title", title)?;
        nc.add_attribute("Conventions", "CF-1.6")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GridSpec;

    fn sample() -> GridDataset {
        let spec = GridSpec {
            lat_min: 0.0,
            lat_max: 1.0,
            lon_min: 100.0,
            lon_max: 101.0,
            resolution: 0.5,
        };
        let builder =
            GridDatasetBuilder::new(spec, NaiveDate::from_ymd_opt(2025, 5, 1).unwrap());
        builder
            .build(
                "co2",
                "CO2 mixing ratio",
                Array2::from_shape_fn((3, 3), |(i, j)| 400.0 + i as f64 + j as f64),
            )
            .unwrap()
    }

    #[test]
    fn test_builder_rejects_shape_mismatch() {
        let spec = GridSpec {
            lat_min: 0.0,
            lat_max: 1.0,
            lon_min: 100.0,
            lon_max: 101.0,
            resolution: 0.5,
        };
        let builder =
            GridDatasetBuilder::new(spec, NaiveDate::from_ymd_opt(2025, 5, 1).unwrap());
        let result = builder.build("co2", "CO2 mixing ratio", Array2::zeros((2, 3)));
        assert!(matches!(result, Err(GridError::Processing(_))));
    }

    #[test]
    fn test_builder_axes_are_increasing() {
        let ds = sample();
        assert_eq!(ds.lat, vec![0.0, 0.5, 1.0]);
        assert_eq!(ds.lon, vec![100.0, 100.5, 101.0]);
        assert_eq!(ds.units, "ppm");
    }

    #[test]
    fn test_written_layer_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("co2.nc");
        let ds = sample();
        GridWriter::write(&ds, &path, "Interpolated CO2 Data (IDW)").unwrap();

        let nc = netcdf::open(&path).unwrap();
        assert_eq!(nc.dimension("time").unwrap().len(), 1);
        assert_eq!(nc.dimension("lat").unwrap().len(), 3);
        assert_eq!(nc.dimension("lon").unwrap().len(), 3);

        let var = nc.variable("co2").unwrap();
        let units: String = var
            .attribute("units")
            .and_then(|a| match a.value().ok()? {
                netcdf::AttributeValue::Str(s) => Some(s),
                _ => None,
            })
            .unwrap();
        assert_eq!(units, "ppm");

        let lat = nc.variable("lat").unwrap();
        assert!(lat.attribute("_FillValue").is_none());
        let axis: String = lat
            .attribute("axis")
            .and_then(|a| match a.value().ok()? {
                netcdf::AttributeValue::Str(s) => Some(s),
                _ => None,
            })
            .unwrap();
        assert_eq!(axis, "Y");
    }
}
