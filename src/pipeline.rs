//! The comparison run: fetch, aggregate, align, roll, compare, join, render.

use anyhow::Result;
use tracing::info;

use crate::analyzers::aggregate::{AggregateOutcome, aggregate_daily};
use crate::analyzers::align::{AlignedSeriesPair, align};
use crate::analyzers::rolling::{RollingWindow, rolling_mean, variation};
use crate::analyzers::types::{Metric, Series};
use crate::config::{PipelineConfig, Period};
use crate::error::PipelineError;
use crate::output::ReportSink;
use crate::services::baseline_source::BaselineSource;
use crate::services::trip_source::{TripSource, load_months};
use crate::stats::{ComparisonRow, ComparisonStats, join_baseline};

/// Rolling and daily variation of one metric between the two periods.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricComparison {
    pub metric: Metric,
    pub earlier_rolling: Series,
    pub later_rolling: Series,
    pub rolling_variation: Series,
    pub daily_variation: Series,
}

/// Everything a comparison run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonReport {
    pub config: PipelineConfig,
    pub aligned_days: usize,
    pub rejected_records: usize,
    pub rides: MetricComparison,
    pub duration: MetricComparison,
    /// Ride-count rolling variation joined with the baseline.
    pub comparison: Vec<ComparisonRow>,
    pub stats: ComparisonStats,
}

/// Computes the rolling and daily variation of `metric` over an aligned pair.
pub fn compare_metric(
    pair: &AlignedSeriesPair,
    metric: Metric,
    window: RollingWindow,
) -> crate::error::Result<MetricComparison> {
    let (earlier, later) = pair.metric(metric)?;

    let earlier_rolling = rolling_mean(&earlier, window);
    let later_rolling = rolling_mean(&later, window);

    let rolling_variation = variation(
        format!("{} rolling variation", metric.label()),
        &earlier_rolling,
        &later_rolling,
    )?;
    let daily_variation = variation(
        format!("{} daily variation", metric.label()),
        &earlier,
        &later,
    )?;

    Ok(MetricComparison {
        metric,
        earlier_rolling,
        later_rolling,
        rolling_variation,
        daily_variation,
    })
}

/// Loads and aggregates every month of `period`.
#[tracing::instrument(skip(trips, period), fields(period = %period))]
pub async fn load_period<T: TripSource + ?Sized>(
    trips: &T,
    period: &Period,
) -> crate::error::Result<AggregateOutcome> {
    let records = load_months(trips, period).await?;

    let outcome = aggregate_daily(&period.year.to_string(), &records).map_err(|e| match e {
        PipelineError::EmptyInput { .. } => PipelineError::EmptyInput {
            period: period.to_string(),
        },
        other => other,
    })?;

    info!(
        trips = records.len(),
        days = outcome.daily.len(),
        rejected = outcome.rejected.len(),
        "Period aggregated"
    );

    Ok(outcome)
}

/// Runs a full comparison described by `config` and hands the result to `sink`.
///
/// Any failure aborts the run; both periods and the baseline are required.
pub async fn run<T, B, S>(
    config: &PipelineConfig,
    trips: &T,
    baseline: &B,
    sink: &S,
) -> Result<ComparisonReport>
where
    T: TripSource + ?Sized,
    B: BaselineSource + ?Sized,
    S: ReportSink + ?Sized,
{
    config.validate()?;
    let window = RollingWindow::new(config.window, config.min_periods)?;

    info!(
        earlier = %config.earlier,
        later = %config.later,
        window = window.window(),
        min_periods = window.min_periods(),
        "Starting comparison"
    );

    let earlier = load_period(trips, &config.earlier).await?;
    let later = load_period(trips, &config.later).await?;

    let pair = align(&earlier.daily, &later.daily);
    info!(
        aligned_days = pair.len(),
        earlier_days = earlier.daily.len(),
        later_days = later.daily.len(),
        "Periods aligned"
    );

    let rides = compare_metric(&pair, Metric::Rides, window)?;
    let duration = compare_metric(&pair, Metric::Duration, window)?;

    let baseline_records = baseline.fetch(config.later.year).await?;
    let comparison = join_baseline(&rides.rolling_variation, &baseline_records);
    let stats = ComparisonStats::from_rows(&comparison);

    info!(
        overlap_days = stats.overlap_days,
        correlation = ?stats.correlation,
        "Baseline comparison computed"
    );

    let report = ComparisonReport {
        config: config.clone(),
        aligned_days: pair.len(),
        rejected_records: earlier.rejected.len() + later.rejected.len(),
        rides,
        duration,
        comparison,
        stats,
    };

    let written = sink.render(&report)?;
    info!(files = written.len(), "Report rendered");

    Ok(report)
}
