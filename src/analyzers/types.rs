//! Data types used by the aggregation and variation pipeline.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{PipelineError, Result};

/// Day of the calendar year, `1` being January 1st.
///
/// This is the common axis every series is indexed by, so values from
/// different years can be compared position by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct DayOfYear(u16);

impl DayOfYear {
    pub const FIRST: u16 = 1;
    pub const LAST: u16 = 366;

    pub fn new(value: u16) -> Result<Self> {
        if (Self::FIRST..=Self::LAST).contains(&value) {
            Ok(Self(value))
        } else {
            Err(PipelineError::Config(format!(
                "day of year {value} outside {}..={}",
                Self::FIRST,
                Self::LAST
            )))
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        // ordinal() is always within 1..=366
        Self(date.ordinal() as u16)
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for DayOfYear {
    type Error = PipelineError;

    fn try_from(value: u16) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DayOfYear> for u16 {
    fn from(day: DayOfYear) -> Self {
        day.0
    }
}

impl fmt::Display for DayOfYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ride totals for a single calendar day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DailyTotals {
    pub ride_count: u64,
    /// Sum of ride durations, in seconds.
    pub total_duration: f64,
}

/// Which daily total a series is projected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Rides,
    Duration,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::Rides, Metric::Duration];

    pub fn value(self, totals: &DailyTotals) -> f64 {
        match self {
            Metric::Rides => totals.ride_count as f64,
            Metric::Duration => totals.total_duration,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Rides => "rides",
            Metric::Duration => "duration",
        }
    }
}

/// Daily totals for one collection period, keyed by day of year.
///
/// Only days with at least one valid trip are present. The map is ordered,
/// so iteration is always ascending by day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyAggregate {
    pub label: String,
    pub days: BTreeMap<DayOfYear, DailyTotals>,
}

impl DailyAggregate {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            days: BTreeMap::new(),
        }
    }

    pub fn get(&self, day: DayOfYear) -> Option<&DailyTotals> {
        self.days.get(&day)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn total_rides(&self) -> u64 {
        self.days.values().map(|t| t.ride_count).sum()
    }
}

/// One entry of a [`Series`]. `None` marks a missing value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub day_of_year: DayOfYear,
    pub value: Option<f64>,
}

/// A named, day-of-year indexed numeric series with explicit missing values.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub points: Vec<SeriesPoint>,
}

impl Series {
    pub fn new(name: impl Into<String>, points: Vec<SeriesPoint>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }

    /// Builds a series from an index and values of the same length.
    pub fn from_parts(
        name: impl Into<String>,
        index: &[DayOfYear],
        values: &[Option<f64>],
    ) -> Result<Self> {
        if index.len() != values.len() {
            return Err(PipelineError::Alignment(format!(
                "index has {} entries but {} values were given",
                index.len(),
                values.len()
            )));
        }

        let points = index
            .iter()
            .zip(values)
            .map(|(&day_of_year, &value)| SeriesPoint { day_of_year, value })
            .collect();

        Ok(Self::new(name, points))
    }

    pub fn index(&self) -> Vec<DayOfYear> {
        self.points.iter().map(|p| p.day_of_year).collect()
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn get(&self, day: DayOfYear) -> Option<f64> {
        self.points
            .iter()
            .find(|p| p.day_of_year == day)
            .and_then(|p| p.value)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn present_count(&self) -> usize {
        self.points.iter().filter(|p| p.value.is_some()).count()
    }

    /// Returns `true` if both series carry the same ordered day-of-year index.
    pub fn same_index(&self, other: &Series) -> bool {
        self.points.len() == other.points.len()
            && self
                .points
                .iter()
                .zip(&other.points)
                .all(|(a, b)| a.day_of_year == b.day_of_year)
    }
}
