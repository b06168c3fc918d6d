use crate::core::summary::SummaryStats;
use crate::types::{GridResult, RegionStat, RetrievalPoint};
use csv::{QuoteStyle, WriterBuilder};
use std::path::Path;

/// Literal token used for missing values in the tabular output
const NA_TOKEN: &str = "NA";

/// CSV writer for the per-region report and the filtered point dump.
pub struct ReportWriter;

impl ReportWriter {
    /// Write the tabular report: one row per region in input order, then a
    /// blank separator row and the three labeled summary rows. All fields
    /// are quoted; missing values render as `NA`; summary values are rounded
    /// to 2 decimals.
    pub fn write_report<P: AsRef<Path>>(
        stats: &[RegionStat],
        summary: &SummaryStats,
        path: P,
    ) -> GridResult<()> {
        let path = path.as_ref();
        log::info!("Writing region report to {}", path.display());

        let mut wtr = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .from_path(path)?;

        wtr.write_record(["Year", "Month", "RegionName", "Value"])?;

        for stat in stats {
            let value = if stat.value.is_finite() {
                format!("{}", stat.value)
            } else {
                NA_TOKEN.to_string()
            };
            wtr.write_record([
                stat.year.to_string(),
                stat.month.to_string(),
                stat.region_name.clone(),
                value,
            ])?;
        }

        // Separator, then labeled aggregates with the owning region embedded
        wtr.write_record(["", "", "", ""])?;

        let avg = format!("{:.2}", summary.mean);
        wtr.write_record(["", "", "Average Value", avg.as_str()])?;

        let max_label = format!("Maximum Value ({})", summary.max_region);
        let max_value = format!("{:.2}", summary.max_value);
        wtr.write_record(["", "", max_label.as_str(), max_value.as_str()])?;

        let min_label = format!("Minimum Value ({})", summary.min_region);
        let min_value = format!("{:.2}", summary.min_value);
        wtr.write_record(["", "", min_label.as_str(), min_value.as_str()])?;

        wtr.flush()?;
        Ok(())
    }

    /// Dump the filtered point list for audit, 6-decimal floats.
    pub fn write_points<P: AsRef<Path>>(points: &[RetrievalPoint], path: P) -> GridResult<()> {
        let path = path.as_ref();
        log::info!("Writing {} points to {}", points.len(), path.display());

        let mut wtr = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .from_path(path)?;

        wtr.write_record(["lat", "lon", "value", "anomaly"])?;
        for p in points {
            wtr.write_record([
                format!("{:.6}", p.latitude),
                format!("{:.6}", p.longitude),
                format!("{:.6}", p.value),
                format!("{:.6}", p.anomaly),
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }
}
