//! Global storage quota accounting.
//!
//! One tracker is shared by every segment of every priority class. The
//! counter equals the on-disk bytes of all open-or-undrained segments:
//! incremented on successful append, recharged at restart enumeration,
//! and decremented exactly once when a segment is discarded. Draining
//! does not touch it; drained data stays on disk until discarded.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared atomic byte counter gating admission to disk.
#[derive(Debug)]
pub struct QuotaTracker {
    limit: u64,
    used: AtomicU64,
}

impl QuotaTracker {
    /// Create a tracker with the given byte limit.
    pub fn new(limit: u64) -> Self {
        QuotaTracker {
            limit,
            used: AtomicU64::new(0),
        }
    }

    /// Try to reserve `bytes` against the limit.
    ///
    /// The compare-exchange loop guarantees two concurrent callers never
    /// double-count one admission window.
    pub fn reserve(&self, bytes: u64) -> bool {
        let mut current = self.used.load(Ordering::Relaxed);
        loop {
            let next = match current.checked_add(bytes) {
                Some(next) if next <= self.limit => next,
                _ => return false,
            };
            match self
                .used
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Release previously reserved bytes.
    pub fn release(&self, bytes: u64) {
        let mut current = self.used.load(Ordering::Relaxed);
        loop {
            let next = current.saturating_sub(bytes);
            match self
                .used
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    /// Charge bytes without consulting the limit.
    ///
    /// Used when re-enumerating surviving segments after a restart: data
    /// already on disk stays accounted even if the configured limit
    /// shrank since it was written.
    pub fn charge(&self, bytes: u64) {
        self.used.fetch_add(bytes, Ordering::AcqRel);
    }

    /// Bytes currently accounted.
    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Acquire)
    }

    /// The configured byte limit.
    pub fn limit(&self) -> u64 {
        self.limit
    }
}
