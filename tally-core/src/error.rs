//! Error types for tally-core

use thiserror::Error;

/// Main error type for the tally-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error, including a missing credential at client construction
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure while serializing or delivering an event
    ///
    /// Contained by the dispatcher; never returned from `TrackingClient::track`.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The error raised when a client is built before a credential is set
    pub(crate) fn credential_not_initialized() -> Self {
        Error::Config("credential not initialized".to_string())
    }
}

/// Result type alias for tally-core
pub type Result<T> = std::result::Result<T, Error>;
