//! Server and pipeline configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use trailcal_core::{FeedIdentity, NormalizeOptions};
use url::Url;

use crate::error::{ServerError, ServerResult};
use crate::standardize::PayloadStyle;
use crate::workflow::StepOptions;

/// Where the upstream calendar comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    /// An HTTP(S) URL.
    Url(Url),
    /// A local file.
    File(PathBuf),
}

impl FeedSource {
    /// Parses `http(s)://` values as URLs and everything else as a path.
    pub fn parse(value: &str) -> ServerResult<Self> {
        if value.starts_with("http://") || value.starts_with("https://") {
            let url = Url::parse(value)
                .map_err(|e| ServerError::config(format!("invalid feed URL {value:?}: {e}")))?;
            Ok(Self::Url(url))
        } else if value.is_empty() {
            Err(ServerError::config("feed source is empty"))
        } else {
            Ok(Self::File(PathBuf::from(value)))
        }
    }

    /// Human-readable name used in logs and errors.
    pub fn name(&self) -> String {
        match self {
            Self::Url(url) => url.to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// How events are standardized and assembled.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Request/reply format of the text service.
    pub style: PayloadStyle,
    /// Retry policy of each per-event step.
    pub step_options: StepOptions,
    /// Date rule tunables.
    pub normalize: NormalizeOptions,
    /// Identity stamped on produced calendars.
    pub identity: FeedIdentity,
}

impl PipelineConfig {
    /// Builder: set the payload style.
    pub fn with_style(mut self, style: PayloadStyle) -> Self {
        self.style = style;
        self
    }

    /// Builder: set the per-event step policy.
    pub fn with_step_options(mut self, options: StepOptions) -> Self {
        self.step_options = options;
        self
    }

    /// Builder: set the date rule tunables.
    pub fn with_normalize(mut self, options: NormalizeOptions) -> Self {
        self.normalize = options;
        self
    }

    /// Builder: set the feed identity.
    pub fn with_identity(mut self, identity: FeedIdentity) -> Self {
        self.identity = identity;
        self
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub bind_addr: SocketAddr,

    /// Upstream calendar.
    pub feed: FeedSource,

    /// Directory of the file-backed cache. `None` keeps the cache in memory.
    pub cache_dir: Option<PathBuf>,

    /// Timeout for fetching the upstream feed.
    pub fetch_timeout: Duration,

    /// How long a request for the standardized feed waits for its run
    /// before serving the best-effort calendar.
    pub completion_wait: Duration,

    /// Number of runs kept in the registry.
    pub max_runs: usize,

    /// Pipeline settings.
    pub pipeline: PipelineConfig,
}

/// Default listen address.
pub const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), 8787);

impl ServerConfig {
    /// Creates a configuration serving `feed` with default settings.
    pub fn new(feed: FeedSource) -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR,
            feed,
            cache_dir: None,
            fetch_timeout: Duration::from_secs(30),
            completion_wait: Duration::ZERO,
            max_runs: 32,
            pipeline: PipelineConfig::default(),
        }
    }

    /// Builder: set the listen address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Builder: keep the cache in `dir`.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Builder: set the upstream fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Builder: set how long standardized requests wait for their run.
    pub fn with_completion_wait(mut self, wait: Duration) -> Self {
        self.completion_wait = wait;
        self
    }

    /// Builder: set the number of retained runs.
    pub fn with_max_runs(mut self, max: usize) -> Self {
        self.max_runs = max;
        self
    }

    /// Builder: set the pipeline settings.
    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }
}
