//! CLI error types.

use thiserror::Error;
use trailcal_core::{FormatError, TracingError};
use trailcal_server::ServerError;
use trailcal_standardizer::ServiceError;

/// Result type for CLI operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the CLI.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The input calendar is malformed.
    #[error("malformed calendar: {0}")]
    Format(#[from] FormatError),

    /// The text service could not be set up.
    #[error("standardizer error: {0}")]
    Service(#[from] ServiceError),

    /// The server failed.
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// Logging could not be initialised.
    #[error("tracing error: {0}")]
    Tracing(#[from] TracingError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
