//! Beacon common types, IDs, errors, and configuration.
//!
//! This crate provides foundational types shared across the Beacon SDK:
//! - Session and device identity types
//! - Input-boundary event vocabulary (persistence and latency levels)
//! - Common error types with stable codes
//! - Store and envelope configuration

pub mod config;
pub mod error;
pub mod event;
pub mod id;

pub use config::{DeviceContext, EnvelopeConfig, StoreConfig};
pub use error::{Error, Result};
pub use event::{EventDescriptor, Latency, Persistence};
pub use id::SessionId;
