//! Trailing rolling means and relative variation between aligned series.
//!
//! Missing values are never treated as zero. A rolling mean is taken over the
//! present values of its window only, and a variation is missing whenever one
//! of its operands is missing or the denominator is zero.

use crate::analyzers::types::{Series, SeriesPoint};
use crate::error::{PipelineError, Result};

/// Window parameters for [`rolling_mean`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingWindow {
    window: usize,
    min_periods: usize,
}

impl RollingWindow {
    /// Requires `window >= 1` and `1 <= min_periods <= window`.
    pub fn new(window: usize, min_periods: usize) -> Result<Self> {
        if window == 0 {
            return Err(PipelineError::Config("window must be at least 1".to_string()));
        }
        if min_periods == 0 || min_periods > window {
            return Err(PipelineError::Config(format!(
                "min_periods must be within 1..={window}, got {min_periods}"
            )));
        }
        Ok(Self {
            window,
            min_periods,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn min_periods(&self) -> usize {
        self.min_periods
    }
}

/// Mean of the present values in `values`, if there are at least `min_periods` of them.
fn window_mean(values: &[Option<f64>], min_periods: usize) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .flatten()
        .fold((0.0_f64, 0usize), |(sum, count), v| (sum + *v, count + 1));

    if count < min_periods {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Trailing rolling mean over index positions.
///
/// The value at position `i` is the mean of the present values among
/// positions `i + 1 - window ..= i` (fewer at the start of the series), or
/// missing if fewer than `min_periods` of them are present. The result keeps
/// the source index and name.
pub fn rolling_mean(series: &Series, params: RollingWindow) -> Series {
    let values = series.values();

    let points = series
        .points
        .iter()
        .enumerate()
        .map(|(i, point)| {
            let start = (i + 1).saturating_sub(params.window);
            SeriesPoint {
                day_of_year: point.day_of_year,
                value: window_mean(&values[start..=i], params.min_periods),
            }
        })
        .collect();

    Series::new(series.name.clone(), points)
}

/// Relative change from `earlier` to `later`, in percent.
///
/// Missing if either operand is missing or `earlier` is zero.
pub fn percent_change(earlier: Option<f64>, later: Option<f64>) -> Option<f64> {
    match (earlier, later) {
        (Some(a), Some(b)) if a != 0.0 => Some((b / a - 1.0) * 100.0),
        _ => None,
    }
}

/// Position-by-position [`percent_change`] between two series sharing an index.
///
/// # Errors
///
/// Returns [`PipelineError::Alignment`] if the two indexes differ; aligned
/// series never do.
pub fn variation(name: impl Into<String>, earlier: &Series, later: &Series) -> Result<Series> {
    if !earlier.same_index(later) {
        return Err(PipelineError::Alignment(format!(
            "'{}' and '{}' do not share an index",
            earlier.name, later.name
        )));
    }

    let points = earlier
        .points
        .iter()
        .zip(&later.points)
        .map(|(a, b)| SeriesPoint {
            day_of_year: a.day_of_year,
            value: percent_change(a.value, b.value),
        })
        .collect();

    Ok(Series::new(name, points))
}
