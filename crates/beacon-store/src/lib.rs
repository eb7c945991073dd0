//! Priority-aware disk-backed event store.
//!
//! Serialized events land in rolling append-only segments, one directory
//! per priority class, under a single shared byte quota. Closed segments
//! are immutable and wait on disk until an uploader drains and discards
//! them; when the quota runs out, critical-priority writes evict the
//! oldest normal-priority segment to make room. Eviction never runs the
//! other way.

pub mod error;
pub mod handler;
pub mod quota;
pub mod segment;
pub mod store;

pub use error::{Result, StoreError};
pub use handler::PriorityEventHandler;
pub use quota::QuotaTracker;
pub use segment::{ClosedSegment, Segment};
pub use store::{EventStore, SegmentRegistry};
