//! Error types for tsdb-link

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TsdbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Outbound queue is full")]
    QueueFull,

    #[error("Connection is closed")]
    Closed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for tsdb-link operations
pub type Result<T> = std::result::Result<T, TsdbError>;
