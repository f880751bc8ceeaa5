//! The three published feeds: original, standardized and legacy.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use trailcal_core::{FeedIdentity, legacy, sha256_hex};
use trailcal_standardizer::TextStandardizer;

use crate::cache::ContentCache;
use crate::config::{FeedSource, ServerConfig};
use crate::error::{ServerError, ServerResult};
use crate::pipeline::{CalendarPipeline, RunParams};
use crate::standardize::EventStandardizer;
use crate::store::{FileStore, KvStore, MemoryStore};
use crate::workflow::{RunHandle, RunStatus, WorkflowRegistry};

/// Identifier of the run standardizing `calendar_text`.
///
/// Identical text shares a run; a retry token starts a separate run that
/// bypasses the cache.
pub fn run_id(calendar_text: &str, retry: Option<&str>) -> String {
    format!("{}-{}", sha256_hex(calendar_text), retry.unwrap_or("0"))
}

/// Serves the upstream calendar and its transformed variants.
#[derive(Debug)]
pub struct FeedService {
    source: FeedSource,
    http: reqwest::Client,
    pipeline: Arc<CalendarPipeline>,
    registry: WorkflowRegistry<CalendarPipeline>,
    completion_wait: Duration,
}

impl FeedService {
    /// Creates a service over an existing pipeline.
    pub fn new(source: FeedSource, pipeline: CalendarPipeline) -> ServerResult<Self> {
        let pipeline = Arc::new(pipeline);
        Ok(Self {
            source,
            http: http_client(Duration::from_secs(30))?,
            registry: WorkflowRegistry::new(pipeline.clone()),
            pipeline,
            completion_wait: Duration::ZERO,
        })
    }

    /// Builds the whole stack described by `config` around `service`.
    pub fn from_config(
        config: &ServerConfig,
        service: Arc<dyn TextStandardizer>,
    ) -> ServerResult<Self> {
        let store: Arc<dyn KvStore> = match &config.cache_dir {
            Some(dir) => Arc::new(FileStore::new(dir)),
            None => Arc::new(MemoryStore::new()),
        };
        let standardizer = EventStandardizer::new(ContentCache::new(store), service)
            .with_style(config.pipeline.style)
            .with_options(config.pipeline.normalize.clone());
        let pipeline = CalendarPipeline::new(Arc::new(standardizer))
            .with_identity(config.pipeline.identity.clone())
            .with_step_options(config.pipeline.step_options.clone());

        let pipeline = Arc::new(pipeline);
        info!(
            feed = %config.feed.name(),
            cache = ?config.cache_dir,
            style = ?config.pipeline.style,
            "Feed service configured"
        );
        Ok(Self {
            source: config.feed.clone(),
            http: http_client(config.fetch_timeout)?,
            registry: WorkflowRegistry::new(pipeline.clone()).with_max_retained(config.max_runs),
            pipeline,
            completion_wait: config.completion_wait,
        })
    }

    /// Builder: wait up to `wait` for a run before serving the best-effort
    /// calendar.
    pub fn with_completion_wait(mut self, wait: Duration) -> Self {
        self.completion_wait = wait;
        self
    }

    /// Returns the feed identity.
    pub fn identity(&self) -> &FeedIdentity {
        self.pipeline.identity()
    }

    /// Fetches the upstream calendar unchanged.
    pub async fn original(&self) -> ServerResult<String> {
        match &self.source {
            FeedSource::Url(url) => {
                debug!(url = %url, "Fetching feed");
                let response = self
                    .http
                    .get(url.clone())
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| ServerError::fetch(url.as_str(), e.to_string()))?;
                response
                    .text()
                    .await
                    .map_err(|e| ServerError::fetch(url.as_str(), e.to_string()))
            }
            FeedSource::File(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ServerError::fetch(path.display().to_string(), e.to_string())),
        }
    }

    /// Returns the standardized calendar.
    ///
    /// Starts or joins the run for the current upstream text. If the run has
    /// not completed (within the configured wait), the calendar is assembled
    /// from cached events instead.
    pub async fn standardized(&self, retry: Option<&str>) -> ServerResult<String> {
        let text = self.original().await?;
        let handle = self.start(&text, retry).await;

        let status = if self.completion_wait.is_zero() {
            handle.status()
        } else {
            tokio::time::timeout(self.completion_wait, handle.wait())
                .await
                .unwrap_or_else(|_| handle.status())
        };

        match status {
            RunStatus::Complete { output } => Ok(output),
            status => {
                debug!(run = %handle.id(), status = ?status, "Run not complete, serving best effort");
                Ok(self.pipeline.assemble_best_effort(&text).await?)
            }
        }
    }

    /// Returns the deterministic cleanup of the upstream calendar.
    pub async fn legacy(&self) -> ServerResult<String> {
        let text = self.original().await?;
        Ok(legacy::cleanup(&text, self.identity())?)
    }

    /// Starts or joins the run for `calendar_text`.
    pub async fn start(&self, calendar_text: &str, retry: Option<&str>) -> RunHandle {
        let id = run_id(calendar_text, retry);
        self.registry
            .get_or_create(
                &id,
                RunParams {
                    calendar_text: calendar_text.to_string(),
                    force: retry.is_some(),
                },
            )
            .await
    }
}

fn http_client(timeout: Duration) -> ServerResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("trailcal/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ServerError::config(format!("failed to create HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use trailcal_core::parse;
    use trailcal_standardizer::{BoxFuture, DisabledStandardizer, ServiceResult};
    use url::Url;

    use super::*;

    const CALENDAR: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:1@khraces\r\n\
DTSTART;TZID=America/Los_Angeles:20250105T063000\r\n\
DTEND;TZID=America/Los_Angeles:20250105T063000\r\n\
SUMMARY:KHraces Trail Team - Easy - See Notes.\r\n\
DESCRIPTION:Group 1: 5 miles\\nLevel 3: 8 miles (Arrival Time: 6:30 AM)\r\n\
LOCATION:Fullerton Loop\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    struct Counting(AtomicUsize);

    impl TextStandardizer for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn standardize(&self, _user_text: String) -> BoxFuture<'_, ServiceResult<Option<String>>> {
            let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move { Ok(Some(format!("Easy 8mi\nrun {n}"))) })
        }
    }

    fn feed_file() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("team.ics");
        std::fs::write(&path, CALENDAR).unwrap();
        (dir, path)
    }

    fn service(path: PathBuf, text: Arc<dyn TextStandardizer>) -> FeedService {
        let config = ServerConfig::new(FeedSource::File(path))
            .with_completion_wait(Duration::from_secs(5));
        FeedService::from_config(&config, text).unwrap()
    }

    #[test]
    fn run_ids_depend_on_text_and_retry() {
        let a = run_id("text", None);
        assert_eq!(a, format!("{}-0", sha256_hex("text")));
        assert_eq!(a, run_id("text", None));
        assert_ne!(a, run_id("other", None));
        assert!(run_id("text", Some("7")).ends_with("-7"));
    }

    #[tokio::test]
    async fn original_is_served_unchanged() {
        let (_dir, path) = feed_file();
        let feeds = service(path, Arc::new(DisabledStandardizer));

        assert_eq!(feeds.original().await.unwrap(), CALENDAR);
    }

    #[tokio::test]
    async fn missing_file_is_a_fetch_error() {
        let feeds = service(PathBuf::from("/nonexistent/team.ics"), Arc::new(DisabledStandardizer));

        assert!(matches!(
            feeds.original().await,
            Err(ServerError::Fetch { .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_url_is_a_fetch_error() {
        let url = Url::parse("http://127.0.0.1:1/team.ics").unwrap();
        let feeds = FeedService::new(
            FeedSource::Url(url),
            CalendarPipeline::new(Arc::new(EventStandardizer::new(
                ContentCache::new(Arc::new(MemoryStore::new())),
                Arc::new(DisabledStandardizer),
            ))),
        )
        .unwrap();

        match feeds.standardized(None).await {
            Err(ServerError::Fetch { source_name, .. }) => {
                assert_eq!(source_name, "http://127.0.0.1:1/team.ics")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn standardized_waits_for_the_run() {
        let (_dir, path) = feed_file();
        let counting = Arc::new(Counting(AtomicUsize::new(0)));
        let feeds = service(path, counting.clone());

        let output = feeds.standardized(None).await.unwrap();
        let calendar = parse(&output).unwrap();

        assert_eq!(calendar.text("NAME"), Some("DDD"));
        assert_eq!(calendar.events()[0].text("SUMMARY"), Some("Easy 8mi"));
        // Zero-length event away from Zoom gets four hours.
        assert_eq!(
            calendar.events()[0].text("DTEND;TZID=America/Los_Angeles"),
            Some("20250105T103000")
        );

        let again = feeds.standardized(None).await.unwrap();
        assert_eq!(again, output);
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_token_bypasses_the_cache() {
        let (_dir, path) = feed_file();
        let counting = Arc::new(Counting(AtomicUsize::new(0)));
        let feeds = service(path, counting.clone());

        feeds.standardized(None).await.unwrap();
        let retried = feeds.standardized(Some("1")).await.unwrap();

        assert_eq!(counting.0.load(Ordering::SeqCst), 2);
        assert!(
            parse(&retried).unwrap().events()[0]
                .text("DESCRIPTION")
                .unwrap()
                .starts_with("run 2")
        );
    }

    #[tokio::test]
    async fn incomplete_run_serves_best_effort() {
        let (_dir, path) = feed_file();
        let feeds = service(path, Arc::new(Counting(AtomicUsize::new(0))))
            .with_completion_wait(Duration::ZERO);

        // The run has been spawned but not polled yet.
        let output = feeds.standardized(None).await.unwrap();
        let calendar = parse(&output).unwrap();

        assert_eq!(calendar.text("NAME"), Some("DDD"));
        assert_eq!(
            calendar.events()[0].text("SUMMARY"),
            Some("KHraces Trail Team - Easy - See Notes.")
        );
    }

    #[tokio::test]
    async fn legacy_feed_is_deterministic() {
        let (_dir, path) = feed_file();
        let counting = Arc::new(Counting(AtomicUsize::new(0)));
        let feeds = service(path, counting.clone());

        let output = feeds.legacy().await.unwrap();
        let calendar = parse(&output).unwrap();
        let event = &calendar.events()[0];

        assert_eq!(calendar.text("PRODID"), Some(feeds.identity().product_id.as_str()));
        assert_eq!(event.text("SUMMARY"), Some("KHraces Trail Team - Easy"));
        assert_eq!(event.text("DESCRIPTION"), Some("Group 3: 8 miles"));
        assert_eq!(counting.0.load(Ordering::SeqCst), 0);
    }
}
