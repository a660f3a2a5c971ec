//! Joining the bike variation against the mobility baseline, and the summary
//! numbers computed from that join.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::analyzers::types::{DayOfYear, Series};
use crate::analyzers::utility::{mean, pearson};
use crate::services::baseline_source::BaselineRecord;

/// One day of the comparison between bike variation and the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub day_of_year: DayOfYear,
    pub bike_variation: Option<f64>,
    pub baseline_change: Option<f64>,
}

/// Averages the present baseline values per day of year.
fn baseline_by_day(baseline: &[BaselineRecord]) -> BTreeMap<DayOfYear, f64> {
    let mut sums: BTreeMap<DayOfYear, (f64, usize)> = BTreeMap::new();

    for record in baseline {
        if let Some(change) = record.percent_change_from_baseline {
            let entry = sums.entry(record.day_of_year).or_insert((0.0, 0));
            entry.0 += change;
            entry.1 += 1;
        }
    }

    sums.into_iter()
        .map(|(day, (sum, count))| (day, sum / count as f64))
        .collect()
}

/// Left join of `variation` with `baseline` on day of year.
///
/// Every variation entry produces exactly one row, in the variation's order.
/// The baseline side is missing when no record matches the day. Several
/// records on the same day are averaged.
pub fn join_baseline(variation: &Series, baseline: &[BaselineRecord]) -> Vec<ComparisonRow> {
    let by_day = baseline_by_day(baseline);

    variation
        .points
        .iter()
        .map(|point| ComparisonRow {
            day_of_year: point.day_of_year,
            bike_variation: point.value,
            baseline_change: by_day.get(&point.day_of_year).copied(),
        })
        .collect()
}

/// How closely the bike variation tracks the baseline.
///
/// Everything except `variation_days` is computed over the days where both
/// sides are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonStats {
    pub variation_days: usize,
    pub overlap_days: usize,
    pub mean_bike_variation: Option<f64>,
    pub mean_baseline_change: Option<f64>,
    pub mean_abs_difference: Option<f64>,
    pub correlation: Option<f64>,
}

impl ComparisonStats {
    pub fn from_rows(rows: &[ComparisonRow]) -> Self {
        let (bike, baseline): (Vec<f64>, Vec<f64>) = rows
            .iter()
            .filter_map(|row| Some((row.bike_variation?, row.baseline_change?)))
            .unzip();

        let differences: Vec<f64> = bike
            .iter()
            .zip(&baseline)
            .map(|(b, g)| (b - g).abs())
            .collect();

        ComparisonStats {
            variation_days: rows.len(),
            overlap_days: bike.len(),
            mean_bike_variation: mean(&bike),
            mean_baseline_change: mean(&baseline),
            mean_abs_difference: mean(&differences),
            correlation: pearson(&bike, &baseline),
        }
    }
}
