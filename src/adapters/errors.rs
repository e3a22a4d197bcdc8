//! Exchange adapter error types
//!
//! All exchange-related errors are wrapped in ExchangeError enum
//! which implements thiserror for consistent error handling.

use std::fmt;

use thiserror::Error;

/// Error reported by the exchange in an error frame, resolved through the
/// exchange's reference table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    /// Exchange-native error code
    pub code: i64,
    /// HTTP-style status, `None` when the code is not in the reference table
    pub status: Option<u16>,
    /// Human-readable message
    pub message: String,
}

impl RemoteError {
    /// Resolve an error code through a `(code, status, message)` reference table.
    ///
    /// Unmapped codes keep the message sent by the exchange and carry no status.
    pub fn from_table(table: &[(i64, u16, &'static str)], code: i64, fallback: &str) -> Self {
        match table.iter().find(|(c, _, _)| *c == code) {
            Some((_, status, message)) => Self {
                code,
                status: Some(*status),
                message: (*message).to_string(),
            },
            None => Self {
                code,
                status: None,
                message: fallback.to_string(),
            },
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({}): {}", self.code, status, self.message),
            None => write!(f, "{} (unknown): {}", self.code, self.message),
        }
    }
}

/// Exchange-specific error types for adapter operations
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Connection to exchange failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed while a request was still awaiting its reply
    #[error("Connection lost")]
    ConnectionLost,

    /// Exchange rejected a request
    #[error("Remote error {0}")]
    Remote(RemoteError),

    /// Reply did not arrive in time
    #[error("Network timeout after {0}ms")]
    NetworkTimeout(u64),

    /// Pair notation that does not resolve to a listed symbol
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    /// Invalid or unexpected response from exchange
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// REST request failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// WebSocket protocol error (boxed to reduce enum size)
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
}

impl ExchangeError {
    /// Whether the error means the connection itself is gone
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExchangeError::ConnectionFailed(_)
                | ExchangeError::ConnectionLost
                | ExchangeError::WebSocket(_)
        )
    }
}

/// Result type alias for exchange operations
pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;
