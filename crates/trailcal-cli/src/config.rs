//! CLI configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/trailcal/config.toml` by default.
//!
//! The Gemini `api_key` supports secret references:
//! - `pass::path/in/store` is resolved via `pass show`
//! - `env::VAR_NAME` is resolved from the environment
//! - plain text is used as-is

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use trailcal_core::{FeedIdentity, NormalizeOptions};
use trailcal_server::{
    Backoff, DEFAULT_BIND_ADDR, FeedSource, PayloadStyle, PipelineConfig, ServerConfig,
    StepOptions,
};
use trailcal_standardizer::gemini::{GeminiConfig, GeminiStandardizer};
use trailcal_standardizer::{DisabledStandardizer, PromptTemplate, TextStandardizer};

use crate::error::{ClientError, ClientResult};
use crate::secret;

/// Configuration for the trailcal CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// Upstream feed settings.
    pub feed: FeedSettings,

    /// HTTP server settings.
    pub server: ServerSettings,

    /// Gemini settings. Without them events pass through unchanged.
    pub gemini: Option<GeminiSettings>,

    /// Pipeline settings.
    pub pipeline: PipelineSettings,
}

/// Upstream feed settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// URL or path of the club calendar.
    pub source: Option<String>,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Listen address.
    pub bind: SocketAddr,

    /// Cache directory. Defaults to the user data directory.
    pub cache_dir: Option<PathBuf>,

    /// Upstream fetch timeout in seconds.
    pub fetch_timeout: u64,

    /// Seconds a standardized request waits for its run.
    pub completion_wait: u64,

    /// Number of runs kept in memory.
    pub max_runs: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND_ADDR,
            cache_dir: None,
            fetch_timeout: 30,
            completion_wait: 0,
            max_runs: 32,
        }
    }
}

/// Gemini settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    /// API key (supports `pass::` and `env::` prefixes).
    pub api_key: Option<String>,

    /// Model override.
    pub model: Option<String>,

    /// API base URL override.
    pub base_url: Option<String>,

    /// Request timeout in seconds.
    pub timeout: Option<u64>,

    /// TOML file holding a prompt template that replaces the built-in one.
    pub prompt_file: Option<PathBuf>,
}

impl GeminiSettings {
    /// Resolves the API key, expanding secret references.
    pub fn resolve_api_key(&self) -> Result<Option<String>, String> {
        self.api_key.as_deref().map(secret::resolve).transpose()
    }

    /// Builds the Gemini configuration for `style`.
    pub fn to_gemini_config(&self, style: PayloadStyle) -> ClientResult<Option<GeminiConfig>> {
        let Some(api_key) = self.resolve_api_key().map_err(ClientError::Config)? else {
            return Ok(None);
        };

        let mut template = match &self.prompt_file {
            Some(path) => load_template(path)?,
            None => match style {
                PayloadStyle::Plain => PromptTemplate::trail_team(),
                PayloadStyle::EventBlock => PromptTemplate::event_block(),
            },
        };
        if let Some(model) = &self.model {
            template = template.with_model(model);
        }

        let mut config = GeminiConfig::new(api_key).with_template(template);
        if let Some(url) = &self.base_url {
            config = config.with_base_url(url);
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(Some(config))
    }
}

/// Loads a prompt template from a TOML file.
pub fn load_template(path: &Path) -> ClientResult<PromptTemplate> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ClientError::Config(format!("failed to read prompt {}: {e}", path.display()))
    })?;
    toml::from_str(&content).map_err(|e| {
        ClientError::Config(format!("failed to parse prompt {}: {e}", path.display()))
    })
}

/// Pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// `plain` or `event-block`.
    pub style: PayloadStyle,

    /// Retries after the first attempt of each event.
    pub retry_limit: u32,

    /// Seconds between attempts.
    pub retry_delay: u64,

    /// `constant`, `linear` or `exponential`.
    pub backoff: Backoff,

    /// Per-attempt timeout in seconds.
    pub step_timeout: u64,

    /// `LOCATION` of remote meetings.
    pub remote_location: String,

    /// `NAME` of produced calendars.
    pub name: String,

    /// `PRODID` of produced calendars.
    pub product_id: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let steps = StepOptions::default();
        let identity = FeedIdentity::default();
        Self {
            style: PayloadStyle::default(),
            retry_limit: steps.retry_limit,
            retry_delay: steps.retry_delay.as_secs(),
            backoff: steps.backoff,
            step_timeout: steps.timeout.as_secs(),
            remote_location: NormalizeOptions::default().remote_location,
            name: identity.name,
            product_id: identity.product_id,
        }
    }
}

impl PipelineSettings {
    /// Converts to the server's pipeline configuration.
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::default()
            .with_style(self.style)
            .with_step_options(
                StepOptions::default()
                    .with_retries(self.retry_limit, Duration::from_secs(self.retry_delay))
                    .with_backoff(self.backoff)
                    .with_timeout(Duration::from_secs(self.step_timeout)),
            )
            .with_normalize(
                NormalizeOptions::default().with_remote_location(&self.remote_location),
            )
            .with_identity(FeedIdentity::new(&self.name, &self.product_id))
    }
}

impl ClientConfig {
    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("failed to read config: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {e}"))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("trailcal")
    }

    /// Returns the default cache directory.
    pub fn default_cache_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("trailcal")
            .join("events")
    }

    /// Cache directory in effect.
    pub fn cache_dir(&self) -> PathBuf {
        self.server
            .cache_dir
            .clone()
            .unwrap_or_else(Self::default_cache_dir)
    }

    /// Builds the server configuration. `source` overrides the configured feed.
    pub fn to_server_config(&self, source: Option<&str>) -> ClientResult<ServerConfig> {
        let source = source
            .or(self.feed.source.as_deref())
            .ok_or_else(|| ClientError::Config("no feed source configured".to_string()))?;

        Ok(ServerConfig::new(FeedSource::parse(source)?)
            .with_bind_addr(self.server.bind)
            .with_cache_dir(self.cache_dir())
            .with_fetch_timeout(Duration::from_secs(self.server.fetch_timeout))
            .with_completion_wait(Duration::from_secs(self.server.completion_wait))
            .with_max_runs(self.server.max_runs)
            .with_pipeline(self.pipeline.to_pipeline_config()))
    }

    /// Builds the text service. Without an API key events pass through.
    pub fn standardizer(&self) -> ClientResult<Arc<dyn TextStandardizer>> {
        let config = match &self.gemini {
            Some(gemini) => gemini.to_gemini_config(self.pipeline.style)?,
            None => None,
        };

        match config {
            Some(config) => {
                let standardizer = GeminiStandardizer::new(config)?;
                info!(model = standardizer.model(), "Using Gemini standardizer");
                Ok(Arc::new(standardizer))
            }
            None => {
                warn!("No Gemini API key configured, events will pass through unchanged");
                Ok(Arc::new(DisabledStandardizer))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert!(!config.debug);
        assert!(config.feed.source.is_none());
        assert!(config.gemini.is_none());
        assert_eq!(config.server.bind, DEFAULT_BIND_ADDR);
        assert_eq!(config.pipeline.retry_limit, 3);
        assert_eq!(config.pipeline.retry_delay, 60);
        assert_eq!(config.pipeline.step_timeout, 60);
        assert_eq!(config.pipeline.remote_location, "Zoom");
        assert_eq!(config.pipeline.name, "DDD");
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
            debug = true

            [feed]
            source = "https://example.com/team.ics"

            [server]
            bind = "0.0.0.0:9000"
            cache_dir = "/var/cache/trailcal"
            completion_wait = 3

            [gemini]
            api_key = "env::GEMINI_API_KEY"
            model = "gemini-2.5-pro"

            [pipeline]
            style = "event-block"
            retry_limit = 5
            backoff = "exponential"
            name = "Trail"
        "#;

        let config: ClientConfig = toml::from_str(toml_str).unwrap();
        assert!(config.debug);
        assert_eq!(config.server.bind.port(), 9000);
        assert_eq!(config.server.completion_wait, 3);
        assert_eq!(config.server.fetch_timeout, 30);
        assert_eq!(config.pipeline.style, PayloadStyle::EventBlock);
        assert_eq!(config.pipeline.backoff, Backoff::Exponential);
        assert_eq!(config.pipeline.retry_delay, 60);

        let server = config.to_server_config(None).unwrap();
        assert!(matches!(server.feed, FeedSource::Url(_)));
        assert_eq!(server.cache_dir, Some(PathBuf::from("/var/cache/trailcal")));
        assert_eq!(server.completion_wait, Duration::from_secs(3));
        assert_eq!(server.pipeline.step_options.retry_limit, 5);
        assert_eq!(server.pipeline.identity.name, "Trail");
    }

    #[test]
    fn source_override_and_missing_source() {
        let config = ClientConfig::default();
        assert!(matches!(
            config.to_server_config(None),
            Err(ClientError::Config(_))
        ));

        let server = config.to_server_config(Some("team.ics")).unwrap();
        assert_eq!(server.feed, FeedSource::File(PathBuf::from("team.ics")));
    }

    #[test]
    fn no_api_key_means_no_gemini() {
        let settings = GeminiSettings::default();
        assert!(
            settings
                .to_gemini_config(PayloadStyle::Plain)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn gemini_config_uses_style_template_and_overrides() {
        let settings = GeminiSettings {
            api_key: Some("plain-key".to_string()),
            model: Some("gemini-2.5-pro".to_string()),
            timeout: Some(10),
            ..Default::default()
        };

        let config = settings
            .to_gemini_config(PayloadStyle::EventBlock)
            .unwrap()
            .unwrap();
        assert_eq!(config.api_key, "plain-key");
        assert_eq!(config.template.model, "gemini-2.5-pro");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(
            config.template.system_instruction,
            PromptTemplate::event_block().system_instruction
        );
    }

    #[test]
    fn prompt_file_replaces_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.toml");
        std::fs::write(
            &path,
            r#"
                model = "gemini-2.5-flash"
                system_instruction = "Reply with the summary, then the description."

                [[examples]]
                input = "KHraces Trail Team - Rest"
                output = "Rest\nRest"
            "#,
        )
        .unwrap();

        let settings = GeminiSettings {
            api_key: Some("k".to_string()),
            prompt_file: Some(path),
            ..Default::default()
        };
        let config = settings.to_gemini_config(PayloadStyle::Plain).unwrap().unwrap();

        assert_eq!(config.template.model, "gemini-2.5-flash");
        assert_eq!(config.template.examples.len(), 1);
        assert_eq!(config.template.top_p, 0.1);
    }

    #[test]
    fn missing_prompt_file_is_a_config_error() {
        assert!(matches!(
            load_template(Path::new("/nonexistent/prompt.toml")),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn default_paths() {
        assert!(ClientConfig::default_path().ends_with("trailcal/config.toml"));
        assert!(ClientConfig::default_cache_dir().ends_with("trailcal/events"));
    }
}
