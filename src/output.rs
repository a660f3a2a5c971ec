//! Output rendering and persistence for comparison reports.
//!
//! Series are written as CSV tables keyed by `day_of_year`, with missing
//! values left empty, and the run summary as JSON.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::analyzers::types::Series;
use crate::config::Period;
use crate::pipeline::ComparisonReport;
use crate::stats::ComparisonStats;

/// Receives a finished report and renders it somewhere.
pub trait ReportSink {
    /// Renders `report` and returns the paths of the artifacts written.
    fn render(&self, report: &ComparisonReport) -> Result<Vec<PathBuf>>;
}

/// Writes CSV tables and a JSON summary into a directory.
pub struct CsvReportSink {
    output_dir: PathBuf,
}

impl CsvReportSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

/// The parts of a report that go into `summary.json`.
#[derive(Debug, Serialize)]
pub struct ReportSummary<'a> {
    pub generated_at: DateTime<Utc>,
    pub earlier: &'a Period,
    pub later: &'a Period,
    pub window: usize,
    pub min_periods: usize,
    pub region: Option<&'a str>,
    pub aligned_days: usize,
    pub rejected_records: usize,
    pub stats: &'a ComparisonStats,
}

impl<'a> ReportSummary<'a> {
    pub fn from_report(report: &'a ComparisonReport) -> Self {
        ReportSummary {
            generated_at: Utc::now(),
            earlier: &report.config.earlier,
            later: &report.config.later,
            window: report.config.window,
            min_periods: report.config.min_periods,
            region: report.config.region.as_deref(),
            aligned_days: report.aligned_days,
            rejected_records: report.rejected_records,
            stats: &report.stats,
        }
    }
}

fn format_value(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes series sharing one index as columns of a CSV table.
///
/// The header is `day_of_year` followed by each series name.
pub fn write_series_csv(path: &Path, series: &[&Series]) -> Result<()> {
    let Some(first) = series.first() else {
        bail!("no series to write to {}", path.display());
    };
    if let Some(other) = series.iter().find(|s| !s.same_index(first)) {
        bail!(
            "'{}' and '{}' do not share an index",
            first.name,
            other.name
        );
    }

    debug!(path = %path.display(), columns = series.len(), "Writing series CSV");

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

    let mut header = vec!["day_of_year".to_string()];
    header.extend(series.iter().map(|s| s.name.clone()));
    writer.write_record(&header)?;

    for (i, point) in first.points.iter().enumerate() {
        let mut row = vec![point.day_of_year.to_string()];
        row.extend(series.iter().map(|s| format_value(s.points[i].value)));
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes serializable rows as a CSV table with a header derived from their fields.
pub fn write_rows_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    debug!(path = %path.display(), rows = rows.len(), "Writing CSV rows");

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

    for row in rows {
        writer.serialize(row)?;
    }

    writer.flush()?;
    Ok(())
}

/// Logs the report summary as pretty-printed JSON.
pub fn print_json(report: &ComparisonReport) -> Result<()> {
    info!(
        "{}",
        serde_json::to_string_pretty(&ReportSummary::from_report(report))?
    );
    Ok(())
}

impl ReportSink for CsvReportSink {
    fn render(&self, report: &ComparisonReport) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.output_dir)?;
        let mut written = Vec::new();

        for comparison in [&report.rides, &report.duration] {
            let path = self
                .output_dir
                .join(format!("rolling_{}.csv", comparison.metric.label()));
            write_series_csv(
                &path,
                &[&comparison.earlier_rolling, &comparison.later_rolling],
            )?;
            written.push(path);
        }

        let path = self.output_dir.join("rolling_variation.csv");
        write_series_csv(
            &path,
            &[
                &report.rides.rolling_variation,
                &report.duration.rolling_variation,
            ],
        )?;
        written.push(path);

        let path = self.output_dir.join("daily_variation.csv");
        write_series_csv(
            &path,
            &[
                &report.rides.daily_variation,
                &report.duration.daily_variation,
            ],
        )?;
        written.push(path);

        let path = self.output_dir.join("variation_comparison.csv");
        write_rows_csv(&path, &report.comparison)?;
        written.push(path);

        let path = self.output_dir.join("summary.json");
        let summary = serde_json::to_string_pretty(&ReportSummary::from_report(report))?;
        std::fs::write(&path, summary)?;
        written.push(path);

        info!(output_dir = %self.output_dir.display(), files = written.len(), "Report written");
        Ok(written)
    }
}
