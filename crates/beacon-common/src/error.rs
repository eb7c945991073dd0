//! Error types for the Beacon SDK.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for callers that log and move on
//!
//! Nothing here is ever fatal to the host application: the pipeline
//! reports failures as values and the worst acceptable outcome is the
//! loss of the single affected event.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Beacon operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration errors (store thresholds, envelope context).
    Config,
    /// Disk-backed event store errors.
    Storage,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Storage => write!(f, "storage"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for the Beacon SDK.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    // Storage errors (30-39)
    #[error("storage error: {0}")]
    Storage(String),

    #[error("quota exhausted: {requested} bytes requested, {limit} byte limit")]
    QuotaExhausted { requested: u64, limit: u64 },

    #[error("event dropped: {0}")]
    EventDropped(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the stable error code for this error type.
    ///
    /// Error codes are grouped by category:
    /// - 10-19: Configuration errors
    /// - 30-39: Storage errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::Storage(_) => 30,
            Error::QuotaExhausted { .. } => 31,
            Error::EventDropped(_) => 32,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) => ErrorCategory::Config,
            Error::Storage(_) | Error::QuotaExhausted { .. } | Error::EventDropped(_) => {
                ErrorCategory::Storage
            }
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable.
    ///
    /// Recoverable errors may resolve on a later add: quota pressure eases
    /// once the uploader drains and discards segments, and transient I/O
    /// faults clear. Dropped events are gone for good.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) => true,
            Error::Storage(_) => true,
            Error::QuotaExhausted { .. } => true,
            Error::EventDropped(_) => false,
            Error::Io(_) => true,
            Error::Json(_) => true,
        }
    }
}
