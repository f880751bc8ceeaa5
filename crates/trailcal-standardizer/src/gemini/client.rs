//! Gemini `generateContent` HTTP client.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::config::GeminiConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::prompt::{PromptTemplate, Role, Turn};

/// Low-level client for the Generative Language API.
#[derive(Debug)]
pub struct GeminiClient {
    http_client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    /// Creates a client from a validated configuration.
    pub fn new(config: GeminiConfig) -> ServiceResult<Self> {
        config.validate().map_err(ServiceError::configuration)?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                ServiceError::configuration("failed to create HTTP client").with_source(e)
            })?;

        Ok(Self {
            http_client,
            config,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Sends one conversation and returns the reply text, if any.
    pub async fn generate(&self, user_text: &str) -> ServiceResult<Option<String>> {
        let request = GenerateContentRequest::new(&self.config.template, user_text);
        let url = self.config.generate_url();
        debug!(model = %self.config.template.model, turns = request.contents.len(), "Calling Gemini");

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::network("request timeout")
                } else if e.is_connect() {
                    ServiceError::network(format!("connection failed: {}", e))
                } else {
                    ServiceError::network(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return Err(ServiceError::rate_limited(format!(
                "rate limit exceeded{}",
                retry_after
                    .map(|s| format!(", retry after {} seconds", s))
                    .unwrap_or_default()
            )));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ServiceError::authentication("API key rejected"));
        }

        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(ServiceError::authorization("access denied to model"));
        }

        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::bad_request(format!(
                "API error ({}): {}",
                status, body
            )));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::server(format!(
                "API error ({}): {}",
                status, body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::network(format!("failed to read response: {}", e)))?;

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            ServiceError::invalid_response(format!("failed to parse response: {}", e))
        })?;

        parsed.into_text()
    }
}

/// Body of a `generateContent` call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: ApiContent,
    contents: Vec<ApiContent>,
    generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    fn new(template: &PromptTemplate, user_text: &str) -> Self {
        Self {
            system_instruction: ApiContent::new(None, &template.system_instruction),
            contents: template
                .conversation(user_text)
                .into_iter()
                .map(ApiContent::from)
                .collect(),
            generation_config: GenerationConfig {
                temperature: template.temperature,
                top_p: template.top_p,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

impl ApiContent {
    fn new(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(String::from),
            parts: vec![ApiPart {
                text: Some(text.to_string()),
            }],
        }
    }
}

impl From<Turn> for ApiContent {
    fn from(turn: Turn) -> Self {
        let role = match turn.role {
            Role::User => "user",
            Role::Model => "model",
        };
        Self::new(Some(role), &turn.text)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiPart {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    top_p: f64,
}

/// Response from `generateContent`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    content: Option<ApiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, `None` when it is empty.
    fn into_text(self) -> ServiceResult<Option<String>> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ServiceError::blocked(format!("prompt blocked: {}", reason)));
        }

        let Some(candidate) = self.candidates.into_iter().next() else {
            warn!("Gemini returned no candidates");
            return Ok(None);
        };

        if let Some(ref reason) = candidate.finish_reason {
            debug!(finish_reason = %reason, "Gemini candidate finished");
        }

        let text: String = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        Ok(if text.trim().is_empty() { None } else { Some(text) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceErrorCode;
    use crate::prompt::Exchange;

    fn template() -> PromptTemplate {
        PromptTemplate {
            model: "gemini-test".to_string(),
            temperature: 0.0,
            top_p: 0.1,
            system_instruction: "Standardize.".to_string(),
            examples: vec![Exchange::new("raw", "Clean\nText")],
        }
    }

    #[test]
    fn request_body_shape() {
        let request = GenerateContentRequest::new(&template(), "Easy\nGroup 3: 8 miles");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "systemInstruction": { "parts": [{ "text": "Standardize." }] },
                "contents": [
                    { "role": "user", "parts": [{ "text": "raw" }] },
                    { "role": "model", "parts": [{ "text": "Clean\nText" }] },
                    { "role": "user", "parts": [{ "text": "Easy\nGroup 3: 8 miles" }] }
                ],
                "generationConfig": { "temperature": 0.0, "topP": 0.1 }
            })
        );
    }

    #[test]
    fn parse_reply_text() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "text": "Easy 8mi\n" }, { "text": "8 miles easy" }]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 812 }
        }"#;

        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            response.into_text().unwrap(),
            Some("Easy 8mi\n8 miles easy".to_string())
        );
    }

    #[test]
    fn empty_reply_is_none() {
        let json = r#"{ "candidates": [{ "content": { "parts": [] }, "finishReason": "MAX_TOKENS" }] }"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.into_text().unwrap(), None);

        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.into_text().unwrap(), None);
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let json = r#"{ "promptFeedback": { "blockReason": "SAFETY" } }"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();

        let err = response.into_text().unwrap_err();
        assert_eq!(err.code(), ServiceErrorCode::Blocked);
        assert!(!err.is_retryable());
    }

    #[test]
    fn client_rejects_invalid_config() {
        let err = GeminiClient::new(GeminiConfig::new("")).unwrap_err();
        assert_eq!(err.code(), ServiceErrorCode::ConfigurationError);
    }

    #[tokio::test]
    async fn unreachable_service_is_retryable() {
        let config = GeminiConfig::new("secret")
            .with_base_url("http://127.0.0.1:1")
            .with_timeout(std::time::Duration::from_secs(2));
        let client = GeminiClient::new(config).unwrap();

        let err = client.generate("Rest\nRest").await.unwrap_err();
        assert_eq!(err.code(), ServiceErrorCode::NetworkError);
        assert!(err.is_retryable());
    }
}
