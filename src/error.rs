//! # Error Types
//!
//! Custom error types for OpenAero IO using `thiserror`.
//!
//! Only configuration, file and diagnostics handling can fail. The real-time
//! path (capture, normalize, emit) is infallible: torn reads are retried,
//! counter wraparound is arithmetic, and overruns clamp the pad to zero.

use thiserror::Error;

/// Main error type for OpenAero IO
#[derive(Debug, Error)]
pub enum RcIoError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Diagnostics record serialization errors
    #[error("Diagnostics error: {0}")]
    Diagnostics(#[from] serde_json::Error),

    /// Channel index outside the configured channel table
    #[error("Channel index {0} is out of range")]
    InvalidChannel(usize),
}

/// Result type alias for OpenAero IO
pub type Result<T> = std::result::Result<T, RcIoError>;
