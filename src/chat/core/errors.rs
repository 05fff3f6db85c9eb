//! Error types for the chat core.

use thiserror::Error;

/// Chat subsystem error type.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The generation service answered with a non-success status.
    #[error("generation service returned status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },
    /// HTTP transport error.
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    /// The response stream could not be read or decoded.
    #[error("malformed response stream: {0}")]
    Stream(String),
    /// The generation service returned no usable candidate.
    #[error("empty response from generation service")]
    EmptyResponse,
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// Regex compilation error.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A host capability (speech recognition, synthesis) is not available.
    #[error("{0} is not supported on this host")]
    Unsupported(String),
}

/// Convenience result alias for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;
