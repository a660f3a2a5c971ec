//! CLI entry point for the bike-share variation tool.
//!
//! Provides subcommands for comparing two periods of Oslo Bysykkel trips
//! against the regional mobility report, warming the trip cache, and dumping
//! the daily totals of a single period.

use anyhow::{Context, Result};
use bikeshare_variation::{
    analyzers::{aggregate::aggregate_daily, types::DayOfYear},
    config::{DEFAULT_TRIPS_BASE_URL, PipelineConfig, Period},
    fetch::BasicClient,
    infra::{bysykkel::BysykkelTripSource, mobility_report::MobilityReportSource},
    output::{CsvReportSink, print_json, write_rows_csv},
    pipeline,
    services::trip_source::load_months,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bikeshare_variation")]
#[command(about = "Compare bike-share activity between two periods", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two periods and the mobility baseline, writing CSV/JSON output
    Compare {
        /// JSON config file; flags below override its values
        #[arg(short, long)]
        config: Option<String>,

        /// Year the variation is measured from
        #[arg(long)]
        earlier_year: Option<i32>,

        /// Year the variation is measured to
        #[arg(long)]
        later_year: Option<i32>,

        /// Months loaded for both years, e.g. "5,6,7,8"
        #[arg(short, long, value_delimiter = ',')]
        months: Option<Vec<u32>>,

        /// Rolling window, in days
        #[arg(short, long)]
        window: Option<usize>,

        /// Minimum present days in a window for a rolling value
        #[arg(long)]
        min_periods: Option<usize>,

        /// Directory the report is written to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Directory holding cached trip CSVs
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Directory holding the mobility report CSVs
        #[arg(long)]
        baseline_dir: Option<PathBuf>,

        /// Mobility report sub-region (default: country level)
        #[arg(long)]
        region: Option<String>,
    },
    /// Download trip CSVs for a period into the cache
    Fetch {
        #[arg(short, long)]
        year: i32,

        #[arg(short, long, value_delimiter = ',', default_value = "5,6,7,8,9")]
        months: Vec<u32>,

        #[arg(long, default_value = "data/raw")]
        cache_dir: PathBuf,

        #[arg(long, default_value = DEFAULT_TRIPS_BASE_URL)]
        base_url: String,
    },
    /// Aggregate one period into daily totals and write them as CSV
    Daily {
        #[arg(short, long)]
        year: i32,

        #[arg(short, long, value_delimiter = ',', default_value = "5,6,7,8,9")]
        months: Vec<u32>,

        #[arg(long, default_value = "data/raw")]
        cache_dir: PathBuf,

        #[arg(long, default_value = DEFAULT_TRIPS_BASE_URL)]
        base_url: String,

        /// CSV file to write the daily totals to
        #[arg(short, long, default_value = "daily.csv")]
        output: PathBuf,
    },
}

/// One line of the `daily` subcommand output.
#[derive(Serialize)]
struct DailyRow {
    day_of_year: DayOfYear,
    ride_count: u64,
    total_duration: f64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/bikeshare_variation.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bikeshare_variation.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compare {
            config,
            earlier_year,
            later_year,
            months,
            window,
            min_periods,
            output_dir,
            cache_dir,
            baseline_dir,
            region,
        } => {
            let mut config = match config {
                Some(path) => PipelineConfig::load(&path)?,
                None => PipelineConfig::default(),
            };

            if let Some(year) = earlier_year {
                config.earlier.year = year;
            }
            if let Some(year) = later_year {
                config.later.year = year;
            }
            if let Some(months) = months {
                config.earlier.months = months.clone();
                config.later.months = months;
            }
            if let Some(window) = window {
                config.window = window;
            }
            if let Some(min_periods) = min_periods {
                config.min_periods = min_periods;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if let Some(dir) = cache_dir {
                config.cache_dir = dir;
            }
            if baseline_dir.is_some() {
                config.baseline_dir = baseline_dir;
            }
            if region.is_some() {
                config.region = region;
            }

            compare(config).await
        }
        Commands::Fetch {
            year,
            months,
            cache_dir,
            base_url,
        } => fetch(Period::new(year, months), cache_dir, base_url).await,
        Commands::Daily {
            year,
            months,
            cache_dir,
            base_url,
            output,
        } => daily(Period::new(year, months), cache_dir, base_url, &output).await,
    };

    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "Run aborted");
    }

    result
}

/// Runs the full two-period comparison and writes the report.
#[tracing::instrument(skip(config))]
async fn compare(config: PipelineConfig) -> Result<()> {
    let trips = BysykkelTripSource::new(
        BasicClient::new()?,
        config.trips_base_url.clone(),
        config.cache_dir.clone(),
    );
    let baseline = MobilityReportSource::new(
        config.baseline_dir().clone(),
        config.country_code.clone(),
        config.region.clone(),
    );
    let sink = CsvReportSink::new(config.output_dir.clone());

    let report = pipeline::run(&config, &trips, &baseline, &sink)
        .await
        .context("Comparison failed")?;

    print_json(&report)?;
    Ok(())
}

/// Downloads every month of `period` into the cache.
#[tracing::instrument(skip(period), fields(period = %period))]
async fn fetch(period: Period, cache_dir: PathBuf, base_url: String) -> Result<()> {
    let source = BysykkelTripSource::new(BasicClient::new()?, base_url, cache_dir);

    let trips = load_months(&source, &period)
        .await
        .with_context(|| format!("Failed to fetch {period}"))?;

    info!(trips = trips.len(), "Period cached");
    Ok(())
}

/// Aggregates one period and writes its daily totals to `output`.
#[tracing::instrument(skip(period, output), fields(period = %period, output = %output.display()))]
async fn daily(period: Period, cache_dir: PathBuf, base_url: String, output: &Path) -> Result<()> {
    let source = BysykkelTripSource::new(BasicClient::new()?, base_url, cache_dir);

    let trips = load_months(&source, &period)
        .await
        .with_context(|| format!("Failed to fetch {period}"))?;
    let outcome = aggregate_daily(&period.to_string(), &trips)?;

    let rows: Vec<DailyRow> = outcome
        .daily
        .days
        .iter()
        .map(|(day, totals)| DailyRow {
            day_of_year: *day,
            ride_count: totals.ride_count,
            total_duration: totals.total_duration,
        })
        .collect();

    write_rows_csv(output, &rows)?;
    info!(
        days = rows.len(),
        rejected = outcome.rejected.len(),
        "Daily totals written"
    );
    Ok(())
}
