//! Client error types.

use thiserror::Error;

use rental_core::{MailError, StoreError};

/// Client errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP transport failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Websocket failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The realtime server refused or ignored a channel join.
    #[error("channel join failed: {0}")]
    Join(String),

    /// The realtime connection is gone.
    #[error("realtime connection closed")]
    Closed,

    /// Request timed out.
    #[error("request timed out")]
    Timeout,
}

impl From<Error> for StoreError {
    fn from(err: Error) -> Self {
        match err {
            Error::Status {
                status,
                code,
                message,
            } => StoreError::Rejected {
                status,
                code,
                message,
            },
            Error::Decode(e) => StoreError::Decode(e.to_string()),
            Error::Http(e) if e.is_decode() => StoreError::Decode(e.to_string()),
            other => StoreError::Transport(other.to_string()),
        }
    }
}

impl From<Error> for MailError {
    fn from(err: Error) -> Self {
        match err {
            Error::Status {
                status, message, ..
            } => MailError::Rejected { status, message },
            other => MailError::Transport(other.to_string()),
        }
    }
}
