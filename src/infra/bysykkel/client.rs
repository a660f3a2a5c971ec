use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::fetch::{HttpClient, fetch_bytes};
use crate::parser::parse_trips;
use crate::services::trip_source::{TripRecord, TripSource};

/// Monthly trip exports from the Oslo Bysykkel open data service.
///
/// Each month is downloaded once from `{base_url}/{year}/{month:02}.csv` and
/// kept as `{cache_dir}/{year}-{month:02}.csv`. A cached file is always used
/// as is; it is never refreshed.
pub struct BysykkelTripSource<C> {
    client: C,
    base_url: String,
    cache_dir: PathBuf,
}

impl<C: HttpClient> BysykkelTripSource<C> {
    pub fn new(client: C, base_url: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_key(year: i32, month: u32) -> String {
        format!("{year}-{month:02}")
    }

    pub fn cache_path(&self, year: i32, month: u32) -> PathBuf {
        self.cache_dir
            .join(format!("{}.csv", Self::cache_key(year, month)))
    }

    pub fn url(&self, year: i32, month: u32) -> String {
        format!(
            "{}/{year}/{month:02}.csv",
            self.base_url.trim_end_matches('/')
        )
    }

    /// Returns the raw CSV for a month, downloading and caching it on a miss.
    #[tracing::instrument(skip(self))]
    pub async fn load_bytes(&self, year: i32, month: u32) -> Result<Vec<u8>> {
        let path = self.cache_path(year, month);

        let cached = tokio::fs::try_exists(&path)
            .await
            .with_context(|| format!("Failed to check cache file {}", path.display()))?;
        if cached {
            debug!(path = %path.display(), "Cache hit");
            return tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read cached file {}", path.display()));
        }

        let url = self.url(year, month);
        info!(%url, "Cache miss, downloading trips");

        let fetch_start = std::time::Instant::now();
        let bytes = fetch_bytes(&self.client, &url).await?;
        debug!(
            bytes = bytes.len(),
            elapsed_ms = fetch_start.elapsed().as_millis() as u64,
            "Trips downloaded"
        );

        store(&path, &bytes).await?;
        Ok(bytes)
    }
}

/// Writes `bytes` next to `path` and renames it into place, so a partial
/// download never looks like a cache hit.
async fn store(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;
    }

    let partial = path.with_extension("csv.part");
    tokio::fs::write(&partial, bytes)
        .await
        .with_context(|| format!("Failed to write {}", partial.display()))?;
    tokio::fs::rename(&partial, path)
        .await
        .with_context(|| format!("Failed to move {} into the cache", partial.display()))?;

    debug!(path = %path.display(), "Cached trips");
    Ok(())
}

#[async_trait]
impl<C: HttpClient> TripSource for BysykkelTripSource<C> {
    async fn fetch(&self, year: i32, month: u32) -> crate::error::Result<Vec<TripRecord>> {
        if !(1..=12).contains(&month) {
            return Err(PipelineError::Config(format!("month {month} is not within 1..=12")));
        }

        let resource = format!("trips {}", Self::cache_key(year, month));
        let bytes = self
            .load_bytes(year, month)
            .await
            .map_err(|e| PipelineError::fetch(&resource, &e))?;

        parse_trips(&bytes).map_err(|e| PipelineError::fetch(&resource, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MONTH_CSV: &str = "\
started_at,ended_at,duration
2019-05-01 04:01:13.366000+00:00,2019-05-01 04:10:03.214000+00:00,529
2019-05-02 08:00:00+00:00,2019-05-02 08:10:00+00:00,600
";

    struct FakeClient {
        status: u16,
        body: &'static str,
        calls: AtomicUsize,
    }

    impl FakeClient {
        fn new(status: u16, body: &'static str) -> Self {
            Self {
                status,
                body,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl HttpClient for FakeClient {
        async fn execute(&self, _req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = http::Response::builder()
                .status(self.status)
                .body(self.body)
                .unwrap();
            Ok(reqwest::Response::from(response))
        }
    }

    fn temp_cache(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir); // clean up any prior run
        dir
    }

    #[test]
    fn test_cache_key_and_url() {
        let source = BysykkelTripSource::new(
            FakeClient::new(200, ""),
            "https://example.org/trips/v1/",
            "data/raw",
        );

        assert_eq!(
            BysykkelTripSource::<FakeClient>::cache_key(2019, 5),
            "2019-05"
        );
        assert_eq!(source.cache_path(2019, 5), PathBuf::from("data/raw/2019-05.csv"));
        assert_eq!(source.url(2020, 11), "https://example.org/trips/v1/2020/11.csv");
    }

    #[tokio::test]
    async fn test_cache_miss_downloads_and_stores() {
        let dir = temp_cache("bikeshare_variation_test_cache_miss");
        let source = BysykkelTripSource::new(FakeClient::new(200, MONTH_CSV), "http://x", &dir);

        let trips = source.fetch(2019, 5).await.unwrap();

        assert_eq!(trips.len(), 2);
        assert_eq!(source.client.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fs::read_to_string(dir.join("2019-05.csv")).unwrap(), MONTH_CSV);
        assert!(!dir.join("2019-05.csv.part").exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let dir = temp_cache("bikeshare_variation_test_cache_hit");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("2019-06.csv"), MONTH_CSV).unwrap();
        let source = BysykkelTripSource::new(FakeClient::new(500, ""), "http://x", &dir);

        let trips = source.fetch(2019, 6).await.unwrap();

        assert_eq!(trips.len(), 2);
        assert_eq!(source.client.calls.load(Ordering::SeqCst), 0);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_http_error_is_fatal_and_not_cached() {
        let dir = temp_cache("bikeshare_variation_test_cache_error");
        let source = BysykkelTripSource::new(FakeClient::new(404, "missing"), "http://x", &dir);

        let err = source.fetch(2019, 7).await.unwrap_err();

        match err {
            PipelineError::SourceFetch { resource, reason } => {
                assert_eq!(resource, "trips 2019-07");
                assert!(reason.contains("404"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.join("2019-07.csv").exists());
    }

    #[tokio::test]
    async fn test_rejects_invalid_month() {
        let source = BysykkelTripSource::new(FakeClient::new(200, ""), "http://x", "unused");
        assert!(matches!(
            source.fetch(2019, 13).await,
            Err(PipelineError::Config(_))
        ));
    }
}
