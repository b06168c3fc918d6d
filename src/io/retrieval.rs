use crate::types::{GridError, GridResult, RetrievalBatch};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Named-field lookup contract for a retrieval file.
///
/// Fields are addressed by explicit dataset path rather than by declaration
/// order, so differently structured products cannot silently swap the target
/// variable.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalSchema {
    /// Dataset path of the retrieval value (stored as a fraction)
    pub value_path: String,
    /// Dataset path of the sounding latitudes
    pub latitude_path: String,
    /// Dataset path of the sounding longitudes
    pub longitude_path: String,
}

impl Default for RetrievalSchema {
    /// OCO-2 L2 standard product layout
    fn default() -> Self {
        Self {
            value_path: "RetrievalResults/xco2".to_string(),
            latitude_path: "RetrievalGeometry/retrieval_latitude".to_string(),
            longitude_path: "RetrievalGeometry/retrieval_longitude".to_string(),
        }
    }
}

/// HDF5 retrieval-file reader
pub struct RetrievalReader {
    schema: RetrievalSchema,
}

impl RetrievalReader {
    pub fn new() -> Self {
        Self {
            schema: RetrievalSchema::default(),
        }
    }

    pub fn with_schema(schema: RetrievalSchema) -> Self {
        Self { schema }
    }

    /// Recursively find `.h5` files under `data_dir` whose names contain
    /// `pattern` (e.g. "2504" for April 2025).
    ///
    /// Fails with `DataAbsent` when nothing matches; the run must not start
    /// without input.
    pub fn find_files<P: AsRef<Path>>(data_dir: P, pattern: &str) -> GridResult<Vec<PathBuf>> {
        let expr = format!("{}/**/*.h5", data_dir.as_ref().display());
        let mut files: Vec<PathBuf> = glob::glob(&expr)
            .map_err(|e| GridError::InvalidFormat(format!("bad glob pattern: {}", e)))?
            .filter_map(Result::ok)
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.contains(pattern))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        log::info!(
            "Found {} retrieval file(s) matching '{}' under {}",
            files.len(),
            pattern,
            data_dir.as_ref().display()
        );

        if files.is_empty() {
            return Err(GridError::DataAbsent(format!(
                "no .h5 files matching '{}' under {}",
                pattern,
                data_dir.as_ref().display()
            )));
        }
        Ok(files)
    }

    /// Read one retrieval file into a flat batch using the named-field
    /// schema. Arrays of any rank are flattened to 1-D.
    pub fn read_file<P: AsRef<Path>>(&self, path: P) -> GridResult<RetrievalBatch> {
        let path = path.as_ref();
        log::debug!("Reading retrieval file: {}", path.display());

        let file = hdf5::File::open(path)?;
        let values = file.dataset(&self.schema.value_path)?.read_raw::<f64>()?;
        let latitudes = file.dataset(&self.schema.latitude_path)?.read_raw::<f64>()?;
        let longitudes = file
            .dataset(&self.schema.longitude_path)?
            .read_raw::<f64>()?;

        log::debug!(
            "File {}: value={}, lat={}, lon={} elements",
            path.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("<unnamed>"),
            values.len(),
            latitudes.len(),
            longitudes.len()
        );

        Ok(RetrievalBatch {
            values,
            latitudes,
            longitudes,
        })
    }

    /// Read every file in order into one batch list
    pub fn read_all(&self, files: &[PathBuf]) -> GridResult<Vec<RetrievalBatch>> {
        files.iter().map(|f| self.read_file(f)).collect()
    }
}

impl Default for RetrievalReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_files_empty_dir_is_data_absent() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            RetrievalReader::find_files(dir.path(), "2504"),
            Err(GridError::DataAbsent(_))
        ));
    }

    #[test]
    fn test_find_files_filters_by_pattern() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("oco2_L2StdND_2504.h5"), b"").unwrap();
        std::fs::write(dir.path().join("oco2_L2StdND_2505.h5"), b"").unwrap();
        std::fs::write(dir.path().join("notes_2504.txt"), b"").unwrap();

        let files = RetrievalReader::find_files(dir.path(), "2504").unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].to_string_lossy().contains("2504"));
    }

    #[test]
    fn test_default_schema_is_oco2() {
        let s = RetrievalSchema::default();
        assert_eq!(s.value_path, "RetrievalResults/xco2");
    }
}
