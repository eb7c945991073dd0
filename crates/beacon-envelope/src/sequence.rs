//! Process-wide monotonic sequence stamping.
//!
//! Every envelope produced by a process carries a `SequenceStamp`: the
//! session id fixed at service construction plus a sequence number that
//! increases by exactly one per stamp, with no gaps and no repeats, across
//! all priority classes and all calling threads. Nothing is persisted
//! across restarts; a new process gets a fresh session id and starts over.

use std::sync::atomic::{AtomicU64, Ordering};

use beacon_common::SessionId;
use serde::{Deserialize, Serialize};

/// A single sequence stamp: `session_id` + `seq_num`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceStamp {
    /// Opaque identifier fixed for the process lifetime.
    pub session_id: SessionId,
    /// Monotonic per-process counter, starting at 1.
    pub seq_num: u64,
}

impl SequenceStamp {
    /// Render the stamp as the legacy `session:seq` string.
    pub fn render(&self) -> String {
        format!("{}:{}", self.session_id, self.seq_num)
    }
}

/// Shared service handing out sequence stamps.
///
/// Constructed once at process start and shared via `Arc` with every
/// envelope builder; the atomic counter serializes concurrent callers so
/// no two of them observe the same `seq_num`.
#[derive(Debug)]
pub struct SequenceService {
    session_id: SessionId,
    counter: AtomicU64,
}

impl SequenceService {
    /// Create a service with a freshly generated session id.
    pub fn new() -> Self {
        SequenceService {
            session_id: SessionId::new(),
            counter: AtomicU64::new(0),
        }
    }

    /// Next stamp. The first call returns `seq_num == 1`.
    pub fn next(&self) -> SequenceStamp {
        let seq_num = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        SequenceStamp {
            session_id: self.session_id.clone(),
            seq_num,
        }
    }

    /// The session id shared by every stamp from this service.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }
}

impl Default for SequenceService {
    fn default() -> Self {
        Self::new()
    }
}
