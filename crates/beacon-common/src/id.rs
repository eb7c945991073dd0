//! Session and device identity types.
//!
//! A session identifies one process lifetime: every envelope stamped by a
//! process shares one session id, and the uploader uses it to reassemble
//! per-process event order from the sequence numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix marking a device local-id as redacted.
pub const REDACTED_DEVICE_PREFIX: &str = "r:";

/// Session ID fixed for the lifetime of one process.
///
/// Format: 32 lowercase hex characters (a simple-format UUID v4).
/// Example: `7f9c2ba4e88f827d616045507605853e`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new session ID.
    pub fn new() -> Self {
        SessionId(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Parse and validate an existing session ID string.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 32 {
            return None;
        }
        if !s
            .chars()
            .all(|c| matches!(c, '0'..='9' | 'a'..='f'))
        {
            return None;
        }
        Some(SessionId(s.to_string()))
    }

    /// The session id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generate an anonymized device local-id for redacted envelopes.
///
/// The `r:` prefix marks the value as a placeholder rather than a real
/// device identity, so downstream pipelines can tell the two apart.
pub fn anonymous_device_id() -> String {
    format!(
        "{}{}",
        REDACTED_DEVICE_PREFIX,
        uuid::Uuid::new_v4().simple()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_format() {
        let sid = SessionId::new();
        assert_eq!(sid.0.len(), 32);
        assert!(sid.0.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_session_id_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn test_session_id_parse() {
        let sid = SessionId::new();
        assert_eq!(SessionId::parse(sid.as_str()), Some(sid));
        assert_eq!(SessionId::parse("short"), None);
        assert_eq!(
            SessionId::parse("ZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZ"),
            None
        );
    }

    #[test]
    fn test_anonymous_device_id_prefix() {
        let id = anonymous_device_id();
        assert!(id.starts_with(REDACTED_DEVICE_PREFIX));
        assert_eq!(id.len(), REDACTED_DEVICE_PREFIX.len() + 32);
    }
}
