//! Trait and types for the external mobility baseline.

use chrono::NaiveDate;

use crate::analyzers::types::DayOfYear;
use crate::error::Result;

/// One day of a mobility report for one region.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineRecord {
    pub date: NaiveDate,
    pub day_of_year: DayOfYear,
    pub region: String,
    /// Change in transit station visits relative to the report's baseline, in percent.
    pub percent_change_from_baseline: Option<f64>,
}

/// Abstraction over a mobility report provider.
#[async_trait::async_trait]
pub trait BaselineSource {
    /// Returns the daily baseline records for `year`.
    async fn fetch(&self, year: i32) -> Result<Vec<BaselineRecord>>;
}
