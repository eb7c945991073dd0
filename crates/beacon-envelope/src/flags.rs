//! The envelope flags bitfield.
//!
//! A u32 with three independent, OR-combined regions:
//! - bits [0:8): persistence code (Normal=0x01, Critical=0x02)
//! - bits [8:16): latency code (Normal=0x01, RealTime=0x02)
//! - bits 19-21: sensitivity markers (Mark, Hash, Drop)
//!
//! The regions never collapse into a single enum: multiple sensitivity
//! bits may be set at once, and the uploader decodes each region on its
//! own.

use beacon_common::{Latency, Persistence};

use crate::sensitivity::SensitivitySet;

/// Mark sensitivity present.
pub const MARK_BIT: u32 = 0x80000;

/// Hash sensitivity present.
pub const HASH_BIT: u32 = 0x100000;

/// Drop sensitivity present.
pub const DROP_BIT: u32 = 0x200000;

/// Bit offset of the latency code region.
const LATENCY_SHIFT: u32 = 8;

fn persistence_code(persistence: Persistence) -> u32 {
    match persistence {
        Persistence::Normal => 0x01,
        Persistence::Critical => 0x02,
    }
}

fn latency_code(latency: Latency) -> u32 {
    match latency {
        Latency::Normal => 0x01,
        Latency::RealTime => 0x02,
    }
}

/// Compute the flags field for one envelope.
pub fn compute_flags(persistence: Persistence, latency: Latency, set: SensitivitySet) -> u32 {
    let mut flags = persistence_code(persistence) | (latency_code(latency) << LATENCY_SHIFT);
    if set.mark {
        flags |= MARK_BIT;
    }
    if set.hash {
        flags |= HASH_BIT;
    }
    if set.drop {
        flags |= DROP_BIT;
    }
    flags
}
