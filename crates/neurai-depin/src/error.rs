//! Error types for the Neurai DePIN RPC client.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Challenge request error: {message}")]
    Challenge { message: String },

    #[error("Signing error: {message}")]
    Signing { message: String },

    #[error("Transport error: {status} {status_text} - {message}")]
    Transport {
        status: u16,
        status_text: String,
        message: String,
    },

    #[error("RPC error: {message}")]
    Rpc {
        /// JSON-RPC error code, if the server supplied one.
        code: Option<i64>,
        message: String,
        /// Extra payload from the server's error object.
        data: Option<serde_json::Value>,
    },

    #[error("Communication error: {message} ({hint})")]
    Communication { message: String, hint: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for a JSON-RPC error that indicates the challenge the call was
    /// signed with is no longer accepted by the server.
    ///
    /// The server reports this only through the error message text, so this
    /// is deliberately a substring match.
    pub fn is_expired_challenge(&self) -> bool {
        matches!(self, Error::Rpc { message, .. } if message.contains("expired"))
    }
}
