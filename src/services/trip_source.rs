//! Trait and types for a bike-share trip data provider.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::Period;
use crate::error::Result;

/// A single completed ride. Only the start time and duration are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct TripRecord {
    pub start_timestamp: DateTime<Utc>,
    /// Ride duration in seconds. `None` when the source left it blank.
    pub duration_seconds: Option<f64>,
}

/// Abstraction over a provider of monthly trip records (e.g., Oslo Bysykkel).
#[async_trait::async_trait]
pub trait TripSource {
    /// Returns all trips started in `month` (1..=12) of `year`.
    async fn fetch(&self, year: i32, month: u32) -> Result<Vec<TripRecord>>;
}

/// Loads every month of `period` in order and concatenates the trips.
///
/// Stops at the first month that fails to load.
pub async fn load_months<S: TripSource + ?Sized>(
    source: &S,
    period: &Period,
) -> Result<Vec<TripRecord>> {
    let mut trips = Vec::new();

    for &month in &period.months {
        let monthly = source.fetch(period.year, month).await?;
        info!(year = period.year, month, trips = monthly.len(), "Month loaded");
        trips.extend(monthly);
    }

    Ok(trips)
}
