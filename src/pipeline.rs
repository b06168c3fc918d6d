//! End-to-end monthly batch run: retrieval files in, gridded layers and a
//! per-region report out.

use crate::core::{
    GridInterpolator, IdwParams, IngestionFilter, IngestionParams, SummaryReporter, SummaryStats,
    ZonalAggregator,
};
use crate::io::{GridDatasetBuilder, GridWriter, RegionReader, ReportWriter, RetrievalReader};
use crate::types::{
    GridError, GridResult, GridSpec, Region, RegionStat, RetrievalBatch,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Instant;

fn default_field_name() -> String {
    "co2".to_string()
}

fn default_name_key() -> String {
    crate::io::regions::DEFAULT_NAME_KEY.to_string()
}

/// One monthly run's configuration. Defaults mirror the operational OCO-2
/// Indonesia setup.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Directory searched recursively for retrieval files
    pub data_dir: PathBuf,
    /// GeoJSON FeatureCollection of region polygons
    pub regions_path: PathBuf,
    /// All outputs land here
    pub output_dir: PathBuf,
    pub year: i32,
    pub month: u32,
    /// Output variable name, used in file names and the NetCDF schema
    #[serde(default = "default_field_name")]
    pub field_name: String,
    /// Feature property holding the region name
    #[serde(default = "default_name_key")]
    pub region_name_key: String,
    #[serde(default)]
    pub schema: crate::io::RetrievalSchema,
    #[serde(default)]
    pub grid: GridSpec,
    #[serde(default)]
    pub idw: IdwParams,
    #[serde(default)]
    pub ingestion: IngestionParams,
}

impl PipelineConfig {
    /// File-name pattern for the configured month, e.g. "2504" for 2025-04
    pub fn file_pattern(&self) -> String {
        format!("{:02}{:02}", self.year.rem_euclid(100), self.month)
    }

    /// Nominal date of the batch: first of the configured month
    pub fn nominal_date(&self) -> GridResult<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).ok_or_else(|| {
            GridError::InvalidFormat(format!("invalid year/month: {}-{}", self.year, self.month))
        })
    }
}

/// Everything a run produced, with the paths of the persisted artifacts.
#[derive(Debug)]
pub struct RunOutputs {
    pub points_csv: PathBuf,
    pub value_nc: PathBuf,
    pub anomaly_nc: PathBuf,
    pub report_csv: PathBuf,
    pub stats: Vec<RegionStat>,
    pub summary: SummaryStats,
}

/// Full pipeline: discover and read retrieval files, then grid and
/// aggregate via [`run_with_batches`].
pub fn run(config: &PipelineConfig) -> GridResult<RunOutputs> {
    let pattern = config.file_pattern();
    let files = RetrievalReader::find_files(&config.data_dir, &pattern)?;
    let reader = RetrievalReader::with_schema(config.schema.clone());
    let batches = reader.read_all(&files)?;

    let regions = RegionReader::with_name_key(config.region_name_key.clone())
        .read(&config.regions_path)?;

    run_with_batches(config, &batches, &regions)
}

/// Run the processing stages on already-loaded batches and regions.
///
/// Ingestion and interpolation failures abort before any output file is
/// created; per-region failures only degrade that region's statistic.
pub fn run_with_batches(
    config: &PipelineConfig,
    batches: &[RetrievalBatch],
    regions: &[Region],
) -> GridResult<RunOutputs> {
    let started = Instant::now();
    config.grid.validate()?;
    let date = config.nominal_date()?;

    let points =
        IngestionFilter::with_params(config.ingestion.clone()).extract_points(batches)?;
    let interpolator = GridInterpolator::new(&points, config.idw)?;
    let grids = interpolator.interpolate(&config.grid)?;

    // Both fatal-capable stages are done; outputs may be written now.
    std::fs::create_dir_all(&config.output_dir)?;
    let tag = format!("{:02}_{}", config.month, config.year);

    let points_csv = config
        .output_dir
        .join(format!("{}_monthly_{}.csv", config.field_name, tag));
    ReportWriter::write_points(&points, &points_csv)?;

    let builder = GridDatasetBuilder::new(config.grid, date);
    let value_ds = builder.build(
        &config.field_name,
        format!("{} mixing ratio", config.field_name.to_uppercase()),
        grids.value.clone(),
    )?;
    let anomaly_ds = builder.build(
        format!("a{}", config.field_name),
        format!(
            "Difference of {} from median",
            config.field_name.to_uppercase()
        ),
        grids.anomaly.clone(),
    )?;

    let value_nc = config
        .output_dir
        .join(format!("{}_mx_monthly_{}.nc", config.field_name, tag));
    let anomaly_nc = config
        .output_dir
        .join(format!("{}_sns_monthly_{}.nc", config.field_name, tag));
    GridWriter::write(
        &value_ds,
        &value_nc,
        &format!("Interpolated {} Data (IDW)", config.field_name.to_uppercase()),
    )?;
    GridWriter::write(
        &anomaly_ds,
        &anomaly_nc,
        &format!(
            "Interpolated {} Difference (IDW)",
            config.field_name.to_uppercase()
        ),
    )?;

    let stats = ZonalAggregator::new(&value_ds).aggregate_all(regions)?;
    let summary = SummaryReporter::summarize(&stats)?;

    let report_csv = config.output_dir.join(format!(
        "{}.regions.{}{:02}.csv",
        config.field_name, config.year, config.month
    ));
    ReportWriter::write_report(&stats, &summary, &report_csv)?;

    log::info!(
        "Run for {:02}/{} complete in {:.2?}: avg {:.2}, max {:.2} ({}), min {:.2} ({})",
        config.month,
        config.year,
        started.elapsed(),
        summary.mean,
        summary.max_value,
        summary.max_region,
        summary.min_value,
        summary.min_region
    );

    Ok(RunOutputs {
        points_csv,
        value_nc,
        anomaly_nc,
        report_csv,
        stats,
        summary,
    })
}
