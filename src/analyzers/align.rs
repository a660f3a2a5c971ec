//! Reindexing of two daily aggregates onto a shared day-of-year index.

use std::collections::BTreeSet;

use crate::analyzers::types::{DailyAggregate, DailyTotals, DayOfYear, Metric, Series};
use crate::error::Result;

/// Two daily aggregates reindexed onto the union of their days.
///
/// Both sides always share the same ascending index, so they can be combined
/// position by position. A day that one side has no record of is `None` on
/// that side.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSeriesPair {
    index: Vec<DayOfYear>,
    earlier_label: String,
    later_label: String,
    earlier: Vec<Option<DailyTotals>>,
    later: Vec<Option<DailyTotals>>,
}

fn reindex(aggregate: &DailyAggregate, index: &[DayOfYear]) -> Vec<Option<DailyTotals>> {
    index.iter().map(|day| aggregate.get(*day).copied()).collect()
}

fn collect_present(
    label: &str,
    index: &[DayOfYear],
    values: &[Option<DailyTotals>],
) -> DailyAggregate {
    let mut aggregate = DailyAggregate::new(label);
    for (day, totals) in index.iter().zip(values) {
        if let Some(totals) = totals {
            aggregate.days.insert(*day, *totals);
        }
    }
    aggregate
}

/// Aligns `earlier` and `later` on the union of their days.
pub fn align(earlier: &DailyAggregate, later: &DailyAggregate) -> AlignedSeriesPair {
    let index: Vec<DayOfYear> = earlier
        .days
        .keys()
        .chain(later.days.keys())
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    AlignedSeriesPair {
        earlier: reindex(earlier, &index),
        later: reindex(later, &index),
        earlier_label: earlier.label.clone(),
        later_label: later.label.clone(),
        index,
    }
}

impl AlignedSeriesPair {
    pub fn index(&self) -> &[DayOfYear] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn earlier_label(&self) -> &str {
        &self.earlier_label
    }

    pub fn later_label(&self) -> &str {
        &self.later_label
    }

    pub fn earlier(&self) -> &[Option<DailyTotals>] {
        &self.earlier
    }

    pub fn later(&self) -> &[Option<DailyTotals>] {
        &self.later
    }

    /// The days each side actually has data for, as plain aggregates again.
    pub fn earlier_aggregate(&self) -> DailyAggregate {
        collect_present(&self.earlier_label, &self.index, &self.earlier)
    }

    pub fn later_aggregate(&self) -> DailyAggregate {
        collect_present(&self.later_label, &self.index, &self.later)
    }

    /// Projects both sides onto `metric`, e.g. `rides 2019` and `rides 2020`.
    pub fn metric(&self, metric: Metric) -> Result<(Series, Series)> {
        let project = |values: &[Option<DailyTotals>]| -> Vec<Option<f64>> {
            values
                .iter()
                .map(|v| v.as_ref().map(|t| metric.value(t)))
                .collect()
        };

        let earlier = Series::from_parts(
            format!("{} {}", metric.label(), self.earlier_label),
            &self.index,
            &project(&self.earlier),
        )?;
        let later = Series::from_parts(
            format!("{} {}", metric.label(), self.later_label),
            &self.index,
            &project(&self.later),
        )?;

        Ok((earlier, later))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doy(n: u16) -> DayOfYear {
        DayOfYear::new(n).unwrap()
    }

    fn aggregate(label: &str, days: &[(u16, u64, f64)]) -> DailyAggregate {
        let mut aggregate = DailyAggregate::new(label);
        for &(day, ride_count, total_duration) in days {
            aggregate.days.insert(
                doy(day),
                DailyTotals {
                    ride_count,
                    total_duration,
                },
            );
        }
        aggregate
    }

    #[test]
    fn test_union_index_with_missing_markers() {
        let earlier = aggregate("2019", &[(100, 3, 60.0)]);
        let later = aggregate("2020", &[(100, 2, 40.0), (101, 4, 80.0)]);

        let pair = align(&earlier, &later);

        assert_eq!(pair.index(), &[doy(100), doy(101)]);
        assert_eq!(
            pair.earlier(),
            &[
                Some(DailyTotals {
                    ride_count: 3,
                    total_duration: 60.0
                }),
                None
            ]
        );
        assert!(pair.later().iter().all(Option::is_some));
    }

    #[test]
    fn test_index_is_sorted_union() {
        let earlier = aggregate("2019", &[(130, 1, 1.0), (120, 1, 1.0), (125, 1, 1.0)]);
        let later = aggregate("2020", &[(122, 1, 1.0), (135, 1, 1.0), (125, 1, 1.0)]);

        let pair = align(&earlier, &later);
        let days: Vec<u16> = pair.index().iter().map(|d| d.get()).collect();

        assert_eq!(days, vec![120, 122, 125, 130, 135]);
        assert_eq!(pair.earlier().len(), pair.later().len());
    }

    #[test]
    fn test_realign_is_idempotent() {
        let earlier = aggregate("2019", &[(121, 5, 50.0), (123, 6, 60.0)]);
        let later = aggregate("2020", &[(122, 7, 70.0), (123, 8, 80.0)]);

        let pair = align(&earlier, &later);
        let again = align(&pair.earlier_aggregate(), &pair.later_aggregate());

        assert_eq!(pair, again);
    }

    #[test]
    fn test_empty_side() {
        let earlier = aggregate("2019", &[]);
        let later = aggregate("2020", &[(122, 7, 70.0)]);

        let pair = align(&earlier, &later);

        assert_eq!(pair.len(), 1);
        assert_eq!(pair.earlier(), &[None]);
    }

    #[test]
    fn test_metric_projection() {
        let earlier = aggregate("2019", &[(100, 3, 60.0)]);
        let later = aggregate("2020", &[(101, 4, 80.0)]);

        let pair = align(&earlier, &later);
        let (rides_earlier, rides_later) = pair.metric(Metric::Rides).unwrap();
        let (duration_earlier, _) = pair.metric(Metric::Duration).unwrap();

        assert_eq!(rides_earlier.name, "rides 2019");
        assert_eq!(rides_later.name, "rides 2020");
        assert_eq!(rides_earlier.values(), vec![Some(3.0), None]);
        assert_eq!(rides_later.values(), vec![None, Some(4.0)]);
        assert_eq!(duration_earlier.values(), vec![Some(60.0), None]);
        assert!(rides_earlier.same_index(&rides_later));
    }
}
