use crate::analyzers::types::{DailyAggregate, DailyTotals, DayOfYear};
use crate::error::{PipelineError, Result};
use crate::services::trip_source::TripRecord;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Daily totals for one period plus the records that were rejected on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateOutcome {
    pub daily: DailyAggregate,
    /// One [`PipelineError::InvalidRecord`] per trip whose duration was left
    /// out of the sum, in input order.
    pub rejected: Vec<PipelineError>,
}

fn validate_duration(index: usize, trip: &TripRecord) -> Result<f64> {
    match trip.duration_seconds {
        Some(d) if d.is_finite() && d >= 0.0 => Ok(d),
        Some(d) => Err(PipelineError::InvalidRecord {
            index,
            reason: format!("duration {d} is not a non-negative number"),
        }),
        None => Err(PipelineError::InvalidRecord {
            index,
            reason: "duration is missing".to_string(),
        }),
    }
}

/// Collapses trip records into one [`DailyTotals`] per calendar day, keyed by day of year.
///
/// Trips are grouped by the UTC date of their start; input order does not
/// matter. A trip with a missing, negative or non-finite duration still counts
/// as a ride, but its duration is left out of `total_duration` and the record
/// is reported in [`AggregateOutcome::rejected`].
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `trips` is empty.
pub fn aggregate_daily(label: &str, trips: &[TripRecord]) -> Result<AggregateOutcome> {
    if trips.is_empty() {
        return Err(PipelineError::EmptyInput {
            period: label.to_string(),
        });
    }

    let mut by_date: BTreeMap<NaiveDate, DailyTotals> = BTreeMap::new();
    let mut rejected = Vec::new();

    for (index, trip) in trips.iter().enumerate() {
        let totals = by_date.entry(trip.start_timestamp.date_naive()).or_default();
        totals.ride_count += 1;

        match validate_duration(index, trip) {
            Ok(d) => totals.total_duration += d,
            Err(e) => {
                debug!(error = %e, "Trip duration left out of the daily sum");
                rejected.push(e);
            }
        }
    }

    if !rejected.is_empty() {
        warn!(
            label,
            rejected = rejected.len(),
            total = trips.len(),
            "Trip durations left out of the daily sums"
        );
    }

    let mut daily = DailyAggregate::new(label);

    for (date, totals) in by_date {
        let day = DayOfYear::from_date(date);
        match daily.days.get_mut(&day) {
            // Only reachable when the input spans more than one year.
            Some(existing) => {
                warn!(label, %date, day = day.get(), "Day of year collision, merging totals");
                existing.ride_count += totals.ride_count;
                existing.total_duration += totals.total_duration;
            }
            None => {
                daily.days.insert(day, totals);
            }
        }
    }

    debug!(label, days = daily.len(), rides = daily.total_rides(), "Daily aggregate built");

    Ok(AggregateOutcome { daily, rejected })
}
