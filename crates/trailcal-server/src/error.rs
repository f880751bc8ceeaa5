//! Server error types.

use std::io;
use thiserror::Error;
use trailcal_core::FormatError;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while serving feeds.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error (listener, feed file, etc.).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The feed could not be parsed.
    #[error("Malformed calendar: {0}")]
    Format(#[from] FormatError),

    /// The upstream feed could not be fetched.
    #[error("Failed to fetch feed from {source_name}: {message}")]
    Fetch {
        source_name: String,
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ServerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a feed fetch error.
    pub fn fetch(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}
