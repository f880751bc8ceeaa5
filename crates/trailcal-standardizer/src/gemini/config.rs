//! Gemini client configuration.

use std::time::Duration;

use crate::prompt::PromptTemplate;

/// Configuration for the Gemini standardizer.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key sent in the `x-goog-api-key` header.
    pub api_key: String,

    /// Base URL of the Generative Language API.
    ///
    /// Defaults to `https://generativelanguage.googleapis.com/v1beta`.
    pub base_url: String,

    /// Request timeout.
    pub timeout: Duration,

    /// User agent string for API requests.
    pub user_agent: String,

    /// Prompt sent with every request.
    pub template: PromptTemplate,
}

impl GeminiConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

    /// Default API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com/v1beta";

    /// Creates a configuration with the given API key and the club's template.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("trailcal/{}", env!("CARGO_PKG_VERSION")),
            template: PromptTemplate::trail_team(),
        }
    }

    /// Sets the API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the prompt template.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// URL of the `generateContent` method for the configured model.
    pub fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.template.model
        )
    }

    /// Checks that the configuration can be used.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.api_key.trim().is_empty() {
            return Err("api_key is required");
        }
        if self.template.model.trim().is_empty() {
            return Err("model is required");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = GeminiConfig::new("secret");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.user_agent.starts_with("trailcal/"));
        assert_eq!(
            config.generate_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-preview-04-17:generateContent"
        );
    }

    #[test]
    fn builder_and_url() {
        let config = GeminiConfig::new("secret")
            .with_base_url("http://127.0.0.1:9000/v1/")
            .with_timeout(Duration::from_secs(5))
            .with_template(PromptTemplate::trail_team().with_model("gemini-2.5-pro"));

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(
            config.generate_url(),
            "http://127.0.0.1:9000/v1/models/gemini-2.5-pro:generateContent"
        );
    }

    #[test]
    fn validation() {
        assert!(GeminiConfig::new("secret").validate().is_ok());
        assert_eq!(GeminiConfig::new("  ").validate(), Err("api_key is required"));

        let config =
            GeminiConfig::new("secret").with_template(PromptTemplate::trail_team().with_model(""));
        assert_eq!(config.validate(), Err("model is required"));
    }
}
