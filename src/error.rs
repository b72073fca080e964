//! Error types for client-updater.

use thiserror::Error;

/// Result type alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the updater.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure (state directory, staged payloads).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The version request or payload download failed.
    #[error("network error: {0}")]
    Network(String),

    /// The request did not complete in time.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The version document was malformed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Staging or launching the installer failed.
    #[error("install error: {0}")]
    Install(String),

    /// Persisted settings could not be read or written.
    #[error("settings error: {0}")]
    Settings(String),

    /// No update strategy exists for this platform.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// The updater task has stopped.
    #[error("updater has shut down")]
    Shutdown,
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}
