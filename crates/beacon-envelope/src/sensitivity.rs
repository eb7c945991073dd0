//! Privacy sensitivity markers and field transforms.
//!
//! Sensitivities are additive: an event may carry any combination of
//! Mark, Hash, and Drop, and every one present contributes its own flags
//! bit. Field-level effects resolve by precedence: Drop supersedes Hash
//! for the fields both govern, since emptying is the stronger guarantee.

use beacon_common::id::anonymous_device_id;
use serde::{Deserialize, Serialize};

use crate::hash::sha256_hex;
use crate::sequence::SequenceStamp;

/// A per-event privacy directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    /// Flag the event for downstream special handling; no field mutation.
    Mark,
    /// Replace PII-bearing fields with a deterministic one-way hash.
    Hash,
    /// Remove PII-bearing fields entirely.
    Drop,
}

impl Sensitivity {
    /// Parse a sensitivity from a string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "mark" => Some(Sensitivity::Mark),
            "hash" => Some(Sensitivity::Hash),
            "drop" => Some(Sensitivity::Drop),
            _ => None,
        }
    }
}

impl std::fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sensitivity::Mark => write!(f, "mark"),
            Sensitivity::Hash => write!(f, "hash"),
            Sensitivity::Drop => write!(f, "drop"),
        }
    }
}

/// The set of sensitivities attached to one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitivitySet {
    pub mark: bool,
    pub hash: bool,
    pub drop: bool,
}

impl SensitivitySet {
    /// Build a set from a slice of markers. Duplicates are harmless.
    pub fn from_slice(sensitivities: &[Sensitivity]) -> Self {
        let mut set = SensitivitySet::default();
        for s in sensitivities {
            match s {
                Sensitivity::Mark => set.mark = true,
                Sensitivity::Hash => set.hash = true,
                Sensitivity::Drop => set.drop = true,
            }
        }
        set
    }

    /// Whether no sensitivity is present.
    pub fn is_empty(&self) -> bool {
        !self.mark && !self.hash && !self.drop
    }

    /// Whether any field mutation applies (Mark alone mutates nothing).
    pub fn mutates_fields(&self) -> bool {
        self.hash || self.drop
    }
}

/// The PII-bearing fields a transform governs, pre-transform.
#[derive(Debug, Clone, Default)]
pub struct SensitiveFields {
    /// Correlation vector; empty when the caller supplied none.
    pub cv: String,
    /// Session id rendered as the envelope epoch.
    pub epoch: String,
    /// Monotonic sequence number.
    pub seq_num: u64,
    /// Legacy rendering of the stamp, `session:seq`.
    pub seq_rendered: String,
    /// Device local identifier.
    pub device_local_id: String,
    /// User local identifier.
    pub user_local_id: String,
}

impl SensitiveFields {
    /// Assemble the governed fields from caller input and a fresh stamp.
    pub fn new(cv: Option<&str>, stamp: &SequenceStamp, device_local_id: &str, user_local_id: &str) -> Self {
        SensitiveFields {
            cv: cv.unwrap_or("").to_string(),
            epoch: stamp.session_id.to_string(),
            seq_num: stamp.seq_num,
            seq_rendered: stamp.render(),
            device_local_id: device_local_id.to_string(),
            user_local_id: user_local_id.to_string(),
        }
    }
}

/// Applies the sensitivity policy table to envelope fields.
///
/// The redacted device placeholder is generated once per transformer so
/// every dropped envelope from one builder carries the same anonymized id.
#[derive(Debug)]
pub struct SensitivityTransformer {
    redacted_device_id: String,
}

impl SensitivityTransformer {
    /// Create a transformer with a fresh anonymized device placeholder.
    pub fn new() -> Self {
        SensitivityTransformer {
            redacted_device_id: anonymous_device_id(),
        }
    }

    /// Apply the policy table, returning the transformed fields.
    ///
    /// | sensitivity | cv | epoch/seq | device id | user id |
    /// |---|---|---|---|---|
    /// | none / Mark | pass | pass | pass | pass |
    /// | Hash | hashed | epoch hashed, legacy `session:seq` hashed | hashed | hashed |
    /// | Drop | emptied | emptied, seq 0 | `r:` placeholder | emptied |
    pub fn apply(&self, set: SensitivitySet, fields: SensitiveFields) -> SensitiveFields {
        if set.drop {
            return SensitiveFields {
                cv: String::new(),
                epoch: String::new(),
                seq_num: 0,
                seq_rendered: String::new(),
                device_local_id: self.redacted_device_id.clone(),
                user_local_id: String::new(),
            };
        }

        if set.hash {
            return SensitiveFields {
                cv: hash_non_empty(&fields.cv),
                epoch: hash_non_empty(&fields.epoch),
                seq_num: fields.seq_num,
                seq_rendered: hash_non_empty(&fields.seq_rendered),
                device_local_id: hash_non_empty(&fields.device_local_id),
                user_local_id: hash_non_empty(&fields.user_local_id),
            };
        }

        // None or Mark alone: fields pass through untouched.
        fields
    }
}

impl Default for SensitivityTransformer {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash a field, leaving absent (empty) values empty.
fn hash_non_empty(value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        sha256_hex(value)
    }
}
