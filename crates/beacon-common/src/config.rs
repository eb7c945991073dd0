//! Configuration for the event store and envelope builder.
//!
//! Defaults mirror the shipped settings of the telemetry client this SDK
//! replaces: a 50 MiB shared disk quota, 500 events per segment, and small
//! write-side buffering for the normal-priority path.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for the disk-backed event store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Global byte quota shared by every segment of every priority class.
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: u64,

    /// Byte threshold after which the active segment is rolled.
    #[serde(default = "default_segment_max_bytes")]
    pub segment_max_bytes: u64,

    /// Event-count threshold after which the active segment is rolled.
    #[serde(default = "default_segment_max_events")]
    pub segment_max_events: usize,

    /// Events the normal-priority handler may buffer before flushing to
    /// disk. Critical events are never buffered.
    #[serde(default = "default_normal_flush_events")]
    pub normal_flush_events: usize,
}

fn default_quota_bytes() -> u64 {
    50 * 1024 * 1024 // 50 MiB
}

fn default_segment_max_bytes() -> u64 {
    512 * 1024 // 512 KiB
}

fn default_segment_max_events() -> usize {
    500
}

fn default_normal_flush_events() -> usize {
    50
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            quota_bytes: default_quota_bytes(),
            segment_max_bytes: default_segment_max_bytes(),
            segment_max_events: default_segment_max_events(),
            normal_flush_events: default_normal_flush_events(),
        }
    }
}

impl StoreConfig {
    /// Set the global byte quota.
    pub fn with_quota_bytes(mut self, bytes: u64) -> Self {
        self.quota_bytes = bytes;
        self
    }

    /// Set the segment rollover byte threshold.
    pub fn with_segment_max_bytes(mut self, bytes: u64) -> Self {
        self.segment_max_bytes = bytes;
        self
    }

    /// Set the segment rollover event-count threshold.
    pub fn with_segment_max_events(mut self, events: usize) -> Self {
        self.segment_max_events = events;
        self
    }

    /// Set the normal-priority flush threshold.
    pub fn with_normal_flush_events(mut self, events: usize) -> Self {
        self.normal_flush_events = events;
        self
    }

    /// Validate configuration invariants.
    pub fn validate(&self) -> Result<()> {
        if self.quota_bytes == 0 {
            return Err(Error::Config("quota_bytes must be non-zero".to_string()));
        }
        if self.segment_max_bytes == 0 || self.segment_max_events == 0 {
            return Err(Error::Config(
                "segment thresholds must be non-zero".to_string(),
            ));
        }
        if self.segment_max_bytes > self.quota_bytes {
            return Err(Error::Config(format!(
                "segment_max_bytes ({}) exceeds quota_bytes ({})",
                self.segment_max_bytes, self.quota_bytes
            )));
        }
        Ok(())
    }
}

/// Static device and application context stamped into every envelope.
///
/// Supplied once by the host application at SDK construction; the envelope
/// builder copies these into both schema renderings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceContext {
    /// Operating system name (e.g. `Android`, `Linux`).
    pub os_name: String,
    /// Operating system version string.
    pub os_version: String,
    /// Host application identifier.
    pub app_id: String,
    /// Host application version string.
    pub app_version: String,
    /// Device local identifier. Subject to sensitivity transforms.
    pub device_local_id: String,
    /// User local identifier. Subject to sensitivity transforms.
    pub user_local_id: String,
}

/// Configuration for the envelope builder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    /// Instrumentation key identifying the telemetry tenant.
    ///
    /// Nullable by design: an absent iKey renders as an empty field
    /// rather than failing envelope construction.
    pub ikey: Option<String>,

    /// Device and application context.
    pub context: DeviceContext,
}

impl EnvelopeConfig {
    /// Create a config with the given instrumentation key.
    pub fn new(ikey: impl Into<String>, context: DeviceContext) -> Self {
        EnvelopeConfig {
            ikey: Some(ikey.into()),
            context,
        }
    }

    /// The effective iKey: empty when absent.
    pub fn ikey_or_empty(&self) -> &str {
        self.ikey.as_deref().unwrap_or("")
    }
}
