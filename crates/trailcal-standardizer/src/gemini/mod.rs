//! Gemini-backed [`TextStandardizer`].
//!
//! # Example
//!
//! ```ignore
//! use trailcal_standardizer::gemini::{GeminiConfig, GeminiStandardizer};
//!
//! let standardizer = GeminiStandardizer::new(GeminiConfig::new(api_key))?;
//! let reply = standardizer.standardize(user_text).await?;
//! ```

mod client;
mod config;

pub use client::GeminiClient;
pub use config::GeminiConfig;

use crate::error::ServiceResult;
use crate::service::{BoxFuture, TextStandardizer};

/// Standardizes event text with a Gemini model.
#[derive(Debug)]
pub struct GeminiStandardizer {
    client: GeminiClient,
}

impl GeminiStandardizer {
    /// Service name reported in errors and logs.
    pub const NAME: &'static str = "gemini";

    /// Creates a standardizer from the given configuration.
    pub fn new(config: GeminiConfig) -> ServiceResult<Self> {
        let client = GeminiClient::new(config).map_err(|e| e.with_service(Self::NAME))?;
        Ok(Self { client })
    }

    /// Returns the model requests are sent to.
    pub fn model(&self) -> &str {
        &self.client.config().template.model
    }
}

impl TextStandardizer for GeminiStandardizer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn standardize(&self, user_text: String) -> BoxFuture<'_, ServiceResult<Option<String>>> {
        Box::pin(async move {
            self.client
                .generate(&user_text)
                .await
                .map_err(|e| e.with_service(Self::NAME))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::PromptTemplate;

    #[test]
    fn standardizer_reports_name_and_model() {
        let config = GeminiConfig::new("secret")
            .with_template(PromptTemplate::trail_team().with_model("gemini-2.5-pro"));
        let standardizer = GeminiStandardizer::new(config).unwrap();

        assert_eq!(standardizer.name(), "gemini");
        assert_eq!(standardizer.model(), "gemini-2.5-pro");
    }

    #[test]
    fn configuration_errors_carry_service_name() {
        let err = GeminiStandardizer::new(GeminiConfig::new("")).unwrap_err();
        assert_eq!(err.service(), Some("gemini"));
    }
}
