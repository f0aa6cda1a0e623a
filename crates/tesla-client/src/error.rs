//! Error types for Tesla client operations

use thiserror::Error;

use crate::streaming::StreamError;

/// Result type alias for Tesla client operations
pub type Result<T> = std::result::Result<T, TeslaClientError>;

/// Errors that can occur during Tesla client operations
#[derive(Error, Debug)]
pub enum TeslaClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Server returned an error response
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Credentials were rejected or the token is no longer valid
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// The vehicle refused a command and gave a reason
    #[error("{0}")]
    CommandFailed(String),

    /// Streaming error
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),
}

impl TeslaClientError {
    /// Create a server error from status code and message
    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        Self::ServerError {
            status,
            message: message.into(),
        }
    }
}
