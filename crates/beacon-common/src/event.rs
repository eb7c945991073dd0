//! Input-boundary event vocabulary.
//!
//! These types describe what the host application hands the pipeline:
//! an opaque serialized payload plus the routing levels that govern
//! storage retention and upload urgency.

use serde::{Deserialize, Serialize};

/// Durability/priority class of an event.
///
/// Governs storage retention and eviction precedence: critical segments
/// are never evicted to make room for normal ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persistence {
    Normal,
    Critical,
}

impl Persistence {
    /// Directory name for this priority class's segments.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Persistence::Normal => "normal",
            Persistence::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Persistence::Normal => write!(f, "normal"),
            Persistence::Critical => write!(f, "critical"),
        }
    }
}

/// Desired upload urgency, encoded in envelope flags for the uploader's
/// scheduling. Storage treats both levels identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Latency {
    Normal,
    RealTime,
}

impl std::fmt::Display for Latency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Latency::Normal => write!(f, "normal"),
            Latency::RealTime => write!(f, "realtime"),
        }
    }
}

/// An application-supplied event: a qualified name plus an opaque,
/// already-serialized payload. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDescriptor {
    /// Qualified event name (e.g. `com.example.app.pageview`).
    pub name: String,
    /// Opaque serialized payload; the pipeline never inspects it.
    pub payload: String,
}

impl EventDescriptor {
    /// Create a new event descriptor.
    pub fn new(name: impl Into<String>, payload: impl Into<String>) -> Self {
        EventDescriptor {
            name: name.into(),
            payload: payload.into(),
        }
    }
}
