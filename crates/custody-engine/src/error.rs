//! Error types for custody-engine operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CustodyError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid RRULE: {0}")]
    InvalidRule(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Holiday provider error: {0}")]
    Provider(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CustodyError>;
