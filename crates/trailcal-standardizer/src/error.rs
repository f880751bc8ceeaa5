//! Error types for text-standardization service calls.

use std::fmt;
use thiserror::Error;

/// The category of a service error.
///
/// Used to decide whether a failed call is worth retrying or whether the
/// event should be passed through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceErrorCode {
    /// The API key was rejected.
    AuthenticationFailed,
    /// The key is valid but lacks access to the model.
    AuthorizationFailed,
    /// Connection failed, timed out or could not be read.
    NetworkError,
    /// Too many requests.
    RateLimited,
    /// The service returned a 5xx status.
    ServerError,
    /// The response body could not be decoded.
    InvalidResponse,
    /// The service rejected the request (4xx other than auth and rate limit).
    BadRequest,
    /// The request was refused on content grounds.
    Blocked,
    /// Missing or invalid client configuration.
    ConfigurationError,
}

impl ServiceErrorCode {
    /// Returns true if this error is transient and the call may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::RateLimited | Self::ServerError
        )
    }

    /// Returns a stable snake_case name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::BadRequest => "bad_request",
            Self::Blocked => "blocked",
            Self::ConfigurationError => "configuration_error",
        }
    }
}

impl fmt::Display for ServiceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error returned by a [`TextStandardizer`](crate::TextStandardizer).
#[derive(Debug, Error)]
pub struct ServiceError {
    code: ServiceErrorCode,
    message: String,
    /// The service that produced the error (e.g. "gemini").
    service: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ServiceError {
    /// Creates a new service error with the given code and message.
    pub fn new(code: ServiceErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            service: None,
            source: None,
        }
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorCode::AuthenticationFailed, message)
    }

    /// Creates an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorCode::AuthorizationFailed, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorCode::NetworkError, message)
    }

    /// Creates a rate limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorCode::RateLimited, message)
    }

    /// Creates a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorCode::ServerError, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorCode::InvalidResponse, message)
    }

    /// Creates a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorCode::BadRequest, message)
    }

    /// Creates a blocked-content error.
    pub fn blocked(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorCode::Blocked, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorCode::ConfigurationError, message)
    }

    /// Sets the service name for this error.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> ServiceErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the service name, if set.
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref service) = self.service {
            write!(f, "[{}] ", service)?;
        }
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for service calls.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_codes_are_retryable() {
        assert!(ServiceErrorCode::NetworkError.is_retryable());
        assert!(ServiceErrorCode::RateLimited.is_retryable());
        assert!(ServiceErrorCode::ServerError.is_retryable());
        assert!(!ServiceErrorCode::AuthenticationFailed.is_retryable());
        assert!(!ServiceErrorCode::Blocked.is_retryable());
        assert!(!ServiceErrorCode::InvalidResponse.is_retryable());
    }

    #[test]
    fn error_with_service_name() {
        let err = ServiceError::rate_limited("quota exhausted").with_service("gemini");
        assert_eq!(err.code(), ServiceErrorCode::RateLimited);
        assert_eq!(err.service(), Some("gemini"));
        assert!(err.is_retryable());

        let display = err.to_string();
        assert!(display.contains("[gemini]"));
        assert!(display.contains("rate_limited"));
        assert!(display.contains("quota exhausted"));
    }

    #[test]
    fn error_with_source() {
        use std::error::Error;
        let io_err = std::io::Error::other("reset by peer");
        let err = ServiceError::network("failed to read response").with_source(io_err);
        assert!(err.source().is_some());
        assert_eq!(err.message(), "failed to read response");
    }
}
