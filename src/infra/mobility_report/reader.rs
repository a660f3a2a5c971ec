use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::parser::parse_mobility_report;
use crate::services::baseline_source::{BaselineRecord, BaselineSource};

/// Regional mobility reports stored as
/// `{dir}/{year}_{country_code}_Region_Mobility_Report.csv`.
pub struct MobilityReportSource {
    dir: PathBuf,
    country_code: String,
    region: Option<String>,
}

impl MobilityReportSource {
    /// `region = None` keeps the country-level rows.
    pub fn new(dir: impl Into<PathBuf>, country_code: impl Into<String>, region: Option<String>) -> Self {
        Self {
            dir: dir.into(),
            country_code: country_code.into(),
            region,
        }
    }

    pub fn report_path(&self, year: i32) -> PathBuf {
        self.dir.join(format!(
            "{year}_{}_Region_Mobility_Report.csv",
            self.country_code
        ))
    }
}

#[async_trait]
impl BaselineSource for MobilityReportSource {
    async fn fetch(&self, year: i32) -> Result<Vec<BaselineRecord>> {
        let path = self.report_path(year);
        let resource = format!("mobility report {}", path.display());

        let records = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
            .and_then(|bytes| parse_mobility_report(&bytes, self.region.as_deref()))
            .map_err(|e| PipelineError::fetch(&resource, &e))?;

        info!(
            year,
            region = self.region.as_deref().unwrap_or("country"),
            records = records.len(),
            "Mobility report loaded"
        );

        Ok(records)
    }
}
