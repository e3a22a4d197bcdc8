//! Application-wide error types using thiserror
//!
//! Exchange-level failures arrive as `AppError::Exchange`; the remaining
//! variants are raised by the session orchestration and the render pipeline.

use crate::adapters::errors::ExchangeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error(
        "Insufficient terminal width. Need {} more column(s).",
        missing_columns(.required, .available)
    )]
    InsufficientWidth { required: usize, available: usize },

    #[error("Too many pairs requested for current terminal height. Over by {over}.")]
    TooManyRows { over: usize },

    #[error("Ticker data went stale for {stale} of {total} symbols")]
    StalenessExceeded { stale: usize, total: usize },

    #[error("No ticker data: {0}")]
    NoTickerData(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn missing_columns(required: &usize, available: &usize) -> usize {
    required.saturating_sub(*available)
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_error_converts_to_app_error() {
        let exchange_err = ExchangeError::ConnectionFailed("timeout".into());
        let app_err: AppError = exchange_err.into();
        let msg = app_err.to_string();
        assert!(msg.contains("Exchange error"), "Got: {}", msg);
        assert!(msg.contains("timeout"), "Got: {}", msg);
    }

    #[test]
    fn test_insufficient_width_display() {
        let err = AppError::InsufficientWidth {
            required: 220,
            available: 80,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient terminal width. Need 140 more column(s)."
        );
    }

    #[test]
    fn test_too_many_rows_display() {
        let err = AppError::TooManyRows { over: 3 };
        assert_eq!(
            err.to_string(),
            "Too many pairs requested for current terminal height. Over by 3."
        );
    }

    #[test]
    fn test_staleness_display() {
        let err = AppError::StalenessExceeded { stale: 2, total: 2 };
        assert_eq!(err.to_string(), "Ticker data went stale for 2 of 2 symbols");
    }

    #[test]
    fn test_io_error_converts_to_app_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout closed");
        let app_err: AppError = io_err.into();
        assert!(app_err.to_string().contains("stdout closed"));
    }

    #[test]
    fn test_config_error_display() {
        let err = AppError::Config("pulse_over must be positive".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: pulse_over must be positive"
        );
    }
}
