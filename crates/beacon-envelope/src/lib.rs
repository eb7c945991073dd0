//! Envelope construction for Beacon telemetry.
//!
//! This crate turns an application event into a fully-addressed, versioned
//! envelope:
//! - Process-wide monotonic sequence stamping
//! - Privacy sensitivity transforms (mark/hash/drop) over PII-bearing fields
//! - The additive u32 flags bitfield consumed by the uploader
//! - Two wire renderings of one envelope: the legacy numeric-version schema
//!   and the current "2.1" schema with nested device/user extensions

pub mod envelope;
pub mod flags;
pub mod hash;
pub mod sensitivity;
pub mod sequence;

pub use envelope::{
    CurrentEnvelope, DeviceExtension, Envelope, EnvelopeBuilder, ExtensionMap, LegacyEnvelope,
    UserExtension,
};
pub use flags::{compute_flags, DROP_BIT, HASH_BIT, MARK_BIT};
pub use hash::sha256_hex;
pub use sensitivity::{SensitiveFields, Sensitivity, SensitivitySet, SensitivityTransformer};
pub use sequence::{SequenceService, SequenceStamp};

/// Schema version tag of the current envelope rendering.
pub const CURRENT_SCHEMA_VERSION: &str = "2.1";

/// Schema version tag of the legacy envelope rendering.
pub const LEGACY_SCHEMA_VERSION: u32 = 1;
