//! Per-priority-class event handlers.
//!
//! A handler owns the active segment of one priority class: it routes
//! incoming serialized events into it, rolls it when a size or count
//! threshold is crossed, and publishes closed segments to the shared
//! registry for draining. Quota is reserved before every append and
//! handed back if the write fails, so the tracker never drifts from the
//! bytes actually on disk.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use beacon_common::{Persistence, StoreConfig};
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::quota::QuotaTracker;
use crate::segment::{parse_segment_index, ClosedSegment, Segment, OPEN_SUFFIX, SEGMENT_EXTENSION};
use crate::store::SegmentRegistry;

struct HandlerState {
    active: Option<Segment>,
    next_index: u64,
    unflushed: usize,
}

/// Routes events of one priority class into rolling segments.
pub struct PriorityEventHandler {
    priority: Persistence,
    dir: PathBuf,
    config: StoreConfig,
    quota: Arc<QuotaTracker>,
    registry: Arc<SegmentRegistry>,
    state: Mutex<HandlerState>,
}

impl PriorityEventHandler {
    /// Open a handler over its priority directory.
    ///
    /// Re-enumerates segments surviving from an earlier process: closed
    /// files become drainable again, an abandoned active file (crash
    /// before close) is promoted to closed, and the quota tracker is
    /// recharged with their on-disk sizes.
    pub fn open(
        dir: impl Into<PathBuf>,
        priority: Persistence,
        config: StoreConfig,
        quota: Arc<QuotaTracker>,
        registry: Arc<SegmentRegistry>,
    ) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let mut recovered: Vec<(u64, PathBuf, u64)> = Vec::new();
        let open_suffix = format!(".{}.{}", SEGMENT_EXTENSION, OPEN_SUFFIX);
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();

            let final_path = if let Some(stem) = name.strip_suffix(&open_suffix) {
                // Active segment abandoned by a crash: promote to closed.
                let final_name = format!("{}.{}", stem, SEGMENT_EXTENSION);
                let final_path = dir.join(&final_name);
                std::fs::rename(&path, &final_path)?;
                warn!(path = %final_path.display(), "recovered abandoned active segment");
                final_path
            } else if parse_segment_index(&name).is_some() {
                path
            } else {
                continue;
            };

            let file_name = final_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if let Some(index) = parse_segment_index(&file_name) {
                let bytes = std::fs::metadata(&final_path)?.len();
                recovered.push((index, final_path, bytes));
            }
        }

        // Oldest first, matching in-process registration order.
        recovered.sort_by_key(|(index, _, _)| *index);
        let next_index = recovered.last().map_or(1, |(index, _, _)| index + 1);
        for (_, path, bytes) in recovered {
            quota.charge(bytes);
            registry.register(Arc::new(ClosedSegment::new(path, priority, bytes)));
        }

        Ok(PriorityEventHandler {
            priority,
            dir,
            config,
            quota,
            registry,
            state: Mutex::new(HandlerState {
                active: None,
                next_index,
                unflushed: 0,
            }),
        })
    }

    /// This handler's priority class.
    pub fn priority(&self) -> Persistence {
        self.priority
    }

    /// Append one serialized event to the active segment, rolling first
    /// if a threshold would be crossed.
    ///
    /// Fails with [`StoreError::QuotaExhausted`] when the shared tracker
    /// denies the reservation; the caller decides whether eviction
    /// applies. A failed write releases the reservation; the event is
    /// lost, never buffered for retry.
    pub fn add(&self, event: &str) -> Result<()> {
        let needed = event.len() as u64 + 1;
        let mut state = self.state.lock().expect("handler state poisoned");

        if !self.quota.reserve(needed) {
            return Err(StoreError::QuotaExhausted {
                requested: needed,
                limit: self.quota.limit(),
            });
        }

        if let Err(e) = self.append_locked(&mut state, event) {
            self.quota.release(needed);
            return Err(e);
        }
        Ok(())
    }

    fn append_locked(&self, state: &mut HandlerState, event: &str) -> Result<()> {
        let needed = event.len() as u64 + 1;

        let must_roll = state.active.as_ref().is_some_and(|segment| {
            !segment.is_empty()
                && (segment.bytes() + needed > self.config.segment_max_bytes
                    || segment.events() + 1 > self.config.segment_max_events)
        });
        if must_roll {
            self.roll_locked(state)?;
        }

        if state.active.is_none() {
            state.active = Some(Segment::create(&self.dir, state.next_index)?);
            state.next_index += 1;
        }
        let segment = state.active.as_mut().expect("active segment just ensured");
        segment.append(event)?;
        state.unflushed += 1;

        // Critical events hit the OS on every append; normal events may
        // ride a small bounded buffer.
        let flush_now = match self.priority {
            Persistence::Critical => true,
            Persistence::Normal => state.unflushed >= self.config.normal_flush_events,
        };
        if flush_now {
            segment.flush()?;
            state.unflushed = 0;
        }
        Ok(())
    }

    /// Close the active segment and publish it to the registry.
    fn roll_locked(&self, state: &mut HandlerState) -> Result<()> {
        if let Some(segment) = state.active.take() {
            let closed = segment.close(self.priority)?;
            debug!(
                priority = %self.priority,
                path = %closed.path().display(),
                "rolled segment"
            );
            self.registry.register(Arc::new(closed));
            state.unflushed = 0;
        }
        Ok(())
    }

    /// Closed segments of this priority not currently leased to a drain
    /// caller. Rolls the active segment first so every accepted event is
    /// observable by the drain.
    pub fn segments_for_draining(&self) -> Result<Vec<Arc<ClosedSegment>>> {
        {
            let mut state = self.state.lock().expect("handler state poisoned");
            if state.active.as_ref().is_some_and(|s| !s.is_empty()) {
                self.roll_locked(&mut state)?;
            }
        }
        Ok(self.registry.lease(self.priority))
    }

    /// Flush and close the active segment. Every event accepted by `add`
    /// before this call is durable and drainable afterwards.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock().expect("handler state poisoned");
        if state.active.as_ref().is_some_and(|s| s.is_empty()) {
            // Nothing accepted; drop the empty file rather than publish it.
            if let Some(segment) = state.active.take() {
                let path = segment.open_path().to_path_buf();
                drop(segment);
                let _ = std::fs::remove_file(path);
            }
            return Ok(());
        }
        self.roll_locked(&mut state)
    }
}
