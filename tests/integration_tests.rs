use async_trait::async_trait;
use bikeshare_variation::analyzers::types::DayOfYear;
use bikeshare_variation::config::{PipelineConfig, Period};
use bikeshare_variation::error::{PipelineError, Result};
use bikeshare_variation::output::CsvReportSink;
use bikeshare_variation::pipeline;
use bikeshare_variation::services::baseline_source::{BaselineRecord, BaselineSource};
use bikeshare_variation::services::trip_source::{TripRecord, TripSource};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;
use std::env;
use std::fs;

/// Trips per (year, month), generated from a daily ride count.
struct MemoryTrips {
    months: HashMap<(i32, u32), Vec<TripRecord>>,
}

impl MemoryTrips {
    fn new() -> Self {
        Self {
            months: HashMap::new(),
        }
    }

    fn with_day(mut self, year: i32, month: u32, day: u32, rides: u32, duration: f64) -> Self {
        let start = Utc.with_ymd_and_hms(year, month, day, 6, 0, 0).unwrap();
        let trips = self.months.entry((year, month)).or_default();
        for i in 0..rides {
            trips.push(TripRecord {
                start_timestamp: start + Duration::minutes(i as i64),
                duration_seconds: Some(duration),
            });
        }
        self
    }
}

#[async_trait]
impl TripSource for MemoryTrips {
    async fn fetch(&self, year: i32, month: u32) -> Result<Vec<TripRecord>> {
        Ok(self.months.get(&(year, month)).cloned().unwrap_or_default())
    }
}

struct MemoryBaseline(Vec<BaselineRecord>);

#[async_trait]
impl BaselineSource for MemoryBaseline {
    async fn fetch(&self, _year: i32) -> Result<Vec<BaselineRecord>> {
        Ok(self.0.clone())
    }
}

fn baseline_record(year: i32, month: u32, day: u32, change: f64) -> BaselineRecord {
    let date = NaiveDate::from_ymd_opt(year, month, day).unwrap();
    BaselineRecord {
        date,
        day_of_year: DayOfYear::from_date(date),
        region: "Norway".to_string(),
        percent_change_from_baseline: Some(change),
    }
}

fn config(output_dir: &str) -> PipelineConfig {
    PipelineConfig {
        earlier: Period::new(2019, vec![5]),
        later: Period::new(2020, vec![5]),
        window: 3,
        min_periods: 2,
        output_dir: env::temp_dir().join(output_dir),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_full_pipeline() {
    let config = config("bikeshare_variation_test_pipeline");
    let _ = fs::remove_dir_all(&config.output_dir); // clean up any prior run

    // 2019-05-01 is day 121, 2020-05-01 is day 122.
    // Day 122 has rides in 2019 on May 2nd and in 2020 on May 1st.
    let trips = MemoryTrips::new()
        .with_day(2019, 5, 1, 10, 600.0)
        .with_day(2019, 5, 2, 10, 600.0)
        .with_day(2019, 5, 3, 10, 600.0)
        .with_day(2020, 5, 1, 5, 300.0)
        .with_day(2020, 5, 2, 5, 300.0)
        .with_day(2020, 5, 3, 5, 300.0);
    let baseline = MemoryBaseline(vec![
        baseline_record(2020, 5, 1, -40.0),
        baseline_record(2020, 5, 2, -45.0),
    ]);
    let sink = CsvReportSink::new(config.output_dir.clone());

    let report = pipeline::run(&config, &trips, &baseline, &sink)
        .await
        .unwrap();

    // union of 121..=123 and 122..=124
    assert_eq!(report.aligned_days, 4);
    assert_eq!(report.rejected_records, 0);

    // 2020 has a single present day in the window ending on day 122
    assert_eq!(
        report.rides.rolling_variation.values(),
        vec![None, None, Some(-50.0), Some(-50.0)]
    );

    // Duration halves per ride and rides halve, so total duration drops by 75%.
    assert_eq!(report.duration.rolling_variation.values()[2], Some(-75.0));

    assert_eq!(report.comparison.len(), 4);
    assert_eq!(report.comparison[1].baseline_change, Some(-40.0));
    assert_eq!(report.comparison[3].baseline_change, None);
    assert_eq!(report.stats.overlap_days, 1);
    assert_eq!(report.stats.mean_bike_variation, Some(-50.0));

    for file in [
        "rolling_rides.csv",
        "rolling_duration.csv",
        "rolling_variation.csv",
        "daily_variation.csv",
        "variation_comparison.csv",
        "summary.json",
    ] {
        assert!(config.output_dir.join(file).exists(), "{file} missing");
    }

    let rolling = fs::read_to_string(config.output_dir.join("rolling_rides.csv")).unwrap();
    assert_eq!(
        rolling.lines().next().unwrap(),
        "day_of_year,rides 2019,rides 2020"
    );

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(config.output_dir.join("summary.json")).unwrap())
            .unwrap();
    assert_eq!(summary["window"], 3);
    assert_eq!(summary["stats"]["overlap_days"], 1);

    fs::remove_dir_all(&config.output_dir).unwrap();
}

#[tokio::test]
async fn test_day_missing_from_one_period_is_missing_after_alignment() {
    // 2019-04-10 is day 100; 2020-04-10 is day 101.
    let config = PipelineConfig {
        earlier: Period::new(2019, vec![4]),
        later: Period::new(2020, vec![4]),
        window: 1,
        min_periods: 1,
        ..config("bikeshare_variation_test_missing_day")
    };
    let _ = fs::remove_dir_all(&config.output_dir);

    let trips = MemoryTrips::new()
        .with_day(2019, 4, 10, 3, 20.0)
        .with_day(2020, 4, 9, 2, 20.0)
        .with_day(2020, 4, 10, 4, 20.0);
    let sink = CsvReportSink::new(config.output_dir.clone());

    let report = pipeline::run(&config, &trips, &MemoryBaseline(vec![]), &sink)
        .await
        .unwrap();

    let earlier = &report.rides.earlier_rolling;
    assert_eq!(earlier.get(DayOfYear::new(100).unwrap()), Some(3.0));
    assert_eq!(earlier.index().len(), 2);
    assert_eq!(earlier.points[1].day_of_year.get(), 101);
    assert_eq!(earlier.points[1].value, None);
    assert_eq!(report.rides.rolling_variation.points[1].value, None);

    fs::remove_dir_all(&config.output_dir).unwrap();
}

#[tokio::test]
async fn test_empty_period_aborts_with_period_name() {
    let config = config("bikeshare_variation_test_empty");
    let trips = MemoryTrips::new().with_day(2019, 5, 1, 10, 600.0);
    let sink = CsvReportSink::new(config.output_dir.clone());

    let err = pipeline::run(&config, &trips, &MemoryBaseline(vec![]), &sink)
        .await
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<PipelineError>(),
        Some(&PipelineError::EmptyInput {
            period: "2020 (months 05)".to_string()
        })
    );
    assert!(!config.output_dir.join("summary.json").exists());
}

#[tokio::test]
async fn test_invalid_config_aborts() {
    let config = PipelineConfig {
        window: 2,
        min_periods: 3,
        ..config("bikeshare_variation_test_bad_config")
    };
    let sink = CsvReportSink::new(config.output_dir.clone());

    let err = pipeline::run(&config, &MemoryTrips::new(), &MemoryBaseline(vec![]), &sink)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::Config(_))
    ));
}
