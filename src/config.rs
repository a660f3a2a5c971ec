//! Pipeline configuration.
//!
//! A [`PipelineConfig`] describes one comparison run: which two periods are
//! compared, how the rolling mean is windowed, and where files are cached and
//! written. It can be loaded from a JSON file; every field has a default that
//! reproduces the reference comparison of May to September 2019 and 2020.
//!
//! ```json
//! {
//!   "earlier": { "year": 2019, "months": [5, 6, 7, 8] },
//!   "later": { "year": 2020, "months": [5, 6, 7, 8] },
//!   "window": 7,
//!   "min_periods": 3
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use crate::error::PipelineError;

pub const DEFAULT_TRIPS_BASE_URL: &str = "https://data.urbansharing.com/oslobysykkel.no/trips/v1";

/// A year plus the months of that year to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub months: Vec<u32>,
}

impl Period {
    pub fn new(year: i32, months: Vec<u32>) -> Self {
        Self { year, months }
    }

    fn validate(&self) -> std::result::Result<(), PipelineError> {
        if self.months.is_empty() {
            return Err(PipelineError::Config(format!(
                "period {} has no months",
                self.year
            )));
        }
        if let Some(month) = self.months.iter().find(|m| !(1..=12).contains(*m)) {
            return Err(PipelineError::Config(format!(
                "period {} has invalid month {month}",
                self.year
            )));
        }
        let mut seen = HashSet::new();
        if let Some(month) = self.months.iter().find(|m| !seen.insert(**m)) {
            return Err(PipelineError::Config(format!(
                "period {} lists month {month} more than once",
                self.year
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let months: Vec<String> = self.months.iter().map(|m| format!("{m:02}")).collect();
        write!(f, "{} (months {})", self.year, months.join(", "))
    }
}

fn default_earlier() -> Period {
    Period::new(2019, vec![5, 6, 7, 8, 9])
}

fn default_later() -> Period {
    Period::new(2020, vec![5, 6, 7, 8, 9])
}

fn default_window() -> usize {
    5
}

fn default_min_periods() -> usize {
    3
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("figures")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data/raw")
}

fn default_trips_base_url() -> String {
    DEFAULT_TRIPS_BASE_URL.to_string()
}

fn default_country_code() -> String {
    "NO".to_string()
}

/// Immutable settings for one comparison run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Period the variation is measured from.
    #[serde(default = "default_earlier")]
    pub earlier: Period,
    /// Period the variation is measured to.
    #[serde(default = "default_later")]
    pub later: Period,
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_min_periods")]
    pub min_periods: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Directory holding cached trip CSVs.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Directory holding the mobility report CSVs. Defaults to `cache_dir`.
    #[serde(default)]
    pub baseline_dir: Option<PathBuf>,
    #[serde(default = "default_trips_base_url")]
    pub trips_base_url: String,
    #[serde(default = "default_country_code")]
    pub country_code: String,
    /// Sub-region to keep from the mobility report. `None` keeps the
    /// country-level rows.
    #[serde(default)]
    pub region: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            earlier: default_earlier(),
            later: default_later(),
            window: default_window(),
            min_periods: default_min_periods(),
            output_dir: default_output_dir(),
            cache_dir: default_cache_dir(),
            baseline_dir: None,
            trips_base_url: default_trips_base_url(),
            country_code: default_country_code(),
            region: None,
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`. Missing fields take their defaults.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{path}'"))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{path}'"))?;
        Ok(config)
    }

    pub fn baseline_dir(&self) -> &PathBuf {
        self.baseline_dir.as_ref().unwrap_or(&self.cache_dir)
    }

    /// Checks the periods and the rolling window parameters.
    pub fn validate(&self) -> std::result::Result<(), PipelineError> {
        self.earlier.validate()?;
        self.later.validate()?;
        crate::analyzers::rolling::RollingWindow::new(self.window, self.min_periods)?;
        if self.trips_base_url.is_empty() {
            return Err(PipelineError::Config("trips_base_url is empty".to_string()));
        }
        Ok(())
    }
}
