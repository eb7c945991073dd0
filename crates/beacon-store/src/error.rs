//! Error types for the event store.

use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors from store operations.
///
/// None of these escalate beyond the single affected event: `add` reports
/// the failure and the pipeline moves on.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("quota exhausted: {requested} bytes requested, {limit} byte limit")]
    QuotaExhausted { requested: u64, limit: u64 },

    #[error("segment is closed: {0}")]
    SegmentClosed(String),

    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
}

impl From<StoreError> for beacon_common::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io(e) => beacon_common::Error::Io(e),
            StoreError::QuotaExhausted { requested, limit } => {
                beacon_common::Error::QuotaExhausted { requested, limit }
            }
            StoreError::SegmentClosed(msg) => beacon_common::Error::Storage(msg),
            StoreError::InvalidConfig(msg) => beacon_common::Error::Config(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_error_message() {
        let err = StoreError::QuotaExhausted {
            requested: 128,
            limit: 64,
        };
        assert!(err.to_string().contains("128"));
        assert!(err.to_string().contains("64"));
    }

    #[test]
    fn test_conversion_to_common_error() {
        let err: beacon_common::Error = StoreError::QuotaExhausted {
            requested: 1,
            limit: 0,
        }
        .into();
        assert_eq!(err.code(), 31);
    }
}
