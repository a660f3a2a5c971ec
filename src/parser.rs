//! CSV parsers for trip exports and mobility reports.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::analyzers::types::DayOfYear;
use crate::services::baseline_source::BaselineRecord;
use crate::services::trip_source::TripRecord;

/// Columns of a monthly trip export that the pipeline reads.
#[derive(Debug, Deserialize)]
struct RawTrip {
    started_at: String,
    duration: Option<String>,
}

/// Columns of a mobility report that the pipeline reads.
#[derive(Debug, Deserialize)]
struct RawMobilityRow {
    country_region: String,
    sub_region_1: Option<String>,
    sub_region_2: Option<String>,
    date: String,
    transit_stations_percent_change_from_baseline: Option<f64>,
}

/// Parses a trip timestamp into UTC.
///
/// Accepts the export format (`2019-05-01 04:01:13.366000+00:00`), RFC 3339,
/// and offset-less timestamps, which are taken as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }

    bail!("unrecognised timestamp '{value}'")
}

/// Decodes a trip export CSV into [`TripRecord`]s.
///
/// A blank or non-numeric duration is kept as `None` so the aggregator can
/// reject the record explicitly. A row that cannot be decoded or whose
/// `started_at` cannot be parsed is skipped with a warning.
///
/// # Errors
///
/// Returns an error if the header cannot be read or has no `started_at`
/// column.
pub fn parse_trips(bytes: &[u8]) -> Result<Vec<TripRecord>> {
    let mut rdr = csv::Reader::from_reader(bytes);
    let headers = rdr.headers().context("Failed to read trip CSV header")?;
    if !headers.iter().any(|h| h.trim() == "started_at") {
        bail!("Trip CSV has no started_at column");
    }

    let mut trips = Vec::new();
    let mut skipped = 0usize;

    for (row, result) in rdr.deserialize().enumerate() {
        let parsed = result
            .map_err(anyhow::Error::from)
            .and_then(|raw: RawTrip| Ok((parse_timestamp(&raw.started_at)?, raw)));
        let (start_timestamp, raw) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(row = row + 1, error = %format!("{e:#}"), "Skipping malformed trip row");
                skipped += 1;
                continue;
            }
        };
        let duration_seconds = raw
            .duration
            .as_deref()
            .and_then(|d| d.trim().parse::<f64>().ok());

        trips.push(TripRecord {
            start_timestamp,
            duration_seconds,
        });
    }

    if skipped > 0 {
        warn!(skipped, kept = trips.len(), "Trip rows skipped");
    }

    Ok(trips)
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

/// Decodes a mobility report CSV into [`BaselineRecord`]s.
///
/// With `region = None` only the country-level rows (no sub-region) are kept;
/// otherwise only the rows for that first-level sub-region.
///
/// # Errors
///
/// Returns an error if the CSV is malformed or a date is not `YYYY-MM-DD`.
pub fn parse_mobility_report(bytes: &[u8], region: Option<&str>) -> Result<Vec<BaselineRecord>> {
    let mut rdr = csv::Reader::from_reader(bytes);
    let mut records = Vec::new();

    for (row, result) in rdr.deserialize().enumerate() {
        let raw: RawMobilityRow =
            result.with_context(|| format!("Malformed mobility report row {}", row + 1))?;

        if !is_blank(&raw.sub_region_2) {
            continue;
        }
        let keep = match region {
            None => is_blank(&raw.sub_region_1),
            Some(wanted) => raw.sub_region_1.as_deref().map(str::trim) == Some(wanted),
        };
        if !keep {
            continue;
        }

        let date = NaiveDate::parse_from_str(raw.date.trim(), "%Y-%m-%d")
            .with_context(|| format!("Bad date in mobility report row {}", row + 1))?;
        let region = match raw.sub_region_1 {
            Some(sub) if !sub.trim().is_empty() => sub.trim().to_string(),
            _ => raw.country_region,
        };

        records.push(BaselineRecord {
            date,
            day_of_year: DayOfYear::from_date(date),
            region,
            percent_change_from_baseline: raw.transit_stations_percent_change_from_baseline,
        });
    }

    Ok(records)
}
