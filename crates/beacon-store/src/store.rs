//! The event store façade and the shared segment registry.
//!
//! The registry is the single source of truth for closed segments across
//! both priority classes: handlers publish into it, drain callers lease
//! from it, and quota-pressure eviction consults it for the oldest
//! discardable normal-priority segment. Handlers never hold references
//! to each other.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use beacon_common::{Persistence, StoreConfig};
use tracing::{info, warn};

use crate::error::{Result, StoreError};
use crate::handler::PriorityEventHandler;
use crate::quota::QuotaTracker;
use crate::segment::ClosedSegment;

/// Registry of closed segments, ordered by registration age.
pub struct SegmentRegistry {
    segments: Mutex<Vec<Arc<ClosedSegment>>>,
}

impl SegmentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        SegmentRegistry {
            segments: Mutex::new(Vec::new()),
        }
    }

    /// Publish a freshly closed segment. Registration order is age order.
    pub fn register(&self, segment: Arc<ClosedSegment>) {
        let mut segments = self.segments.lock().expect("segment registry poisoned");
        segments.push(segment);
    }

    /// Lease every unleased, undiscarded segment of one priority for
    /// draining, oldest first. Discarded segments are pruned in passing.
    pub fn lease(&self, priority: Persistence) -> Vec<Arc<ClosedSegment>> {
        let mut segments = self.segments.lock().expect("segment registry poisoned");
        segments.retain(|s| !s.is_discarded());
        segments
            .iter()
            .filter(|s| s.priority() == priority && s.try_lease())
            .cloned()
            .collect()
    }

    /// Discard the oldest unleased segment of the given priority,
    /// returning the bytes freed, or `None` when nothing is evictable.
    pub fn evict_oldest(
        &self,
        priority: Persistence,
        quota: &QuotaTracker,
    ) -> Result<Option<u64>> {
        let victim = {
            let mut segments = self.segments.lock().expect("segment registry poisoned");
            segments.retain(|s| !s.is_discarded());
            segments
                .iter()
                .find(|s| s.priority() == priority && !s.is_leased())
                .cloned()
        };
        match victim {
            Some(segment) => {
                let bytes = segment.bytes();
                segment.discard(quota)?;
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }

    /// Number of live (undiscarded) registered segments.
    pub fn len(&self) -> usize {
        let mut segments = self.segments.lock().expect("segment registry poisoned");
        segments.retain(|s| !s.is_discarded());
        segments.len()
    }

    /// Whether no live segments are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SegmentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Priority-aware disk-backed event store.
///
/// One instance per process, rooted at a directory with one subdirectory
/// per priority class. The quota tracker and segment registry are shared
/// by both handlers.
pub struct EventStore {
    root: PathBuf,
    quota: Arc<QuotaTracker>,
    registry: Arc<SegmentRegistry>,
    normal: PriorityEventHandler,
    critical: PriorityEventHandler,
}

impl EventStore {
    /// Open (or create) a store rooted at `root`.
    ///
    /// Surviving segments from an earlier process are re-enumerated and
    /// recharged against the quota before any new event is admitted.
    pub fn open(root: impl Into<PathBuf>, config: StoreConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| StoreError::InvalidConfig(e.to_string()))?;
        let root = root.into();
        let quota = Arc::new(QuotaTracker::new(config.quota_bytes));
        let registry = Arc::new(SegmentRegistry::new());

        let normal = PriorityEventHandler::open(
            root.join(Persistence::Normal.dir_name()),
            Persistence::Normal,
            config.clone(),
            Arc::clone(&quota),
            Arc::clone(&registry),
        )?;
        let critical = PriorityEventHandler::open(
            root.join(Persistence::Critical.dir_name()),
            Persistence::Critical,
            config.clone(),
            Arc::clone(&quota),
            Arc::clone(&registry),
        )?;

        info!(
            root = %root.display(),
            recovered_segments = registry.len(),
            recovered_bytes = quota.used(),
            "opened event store"
        );

        Ok(EventStore {
            root,
            quota,
            registry,
            normal,
            critical,
        })
    }

    /// Add one serialized event under the given priority class.
    ///
    /// On quota denial, a critical add evicts the oldest closed
    /// normal-priority segment and retries the reservation once. A
    /// normal add never evicts anything; eviction is strictly
    /// priority-descending. When nothing can be freed the event is
    /// dropped and the denial is returned.
    pub fn add(&self, persistence: Persistence, event: &str) -> Result<()> {
        let handler = self.handler(persistence);
        match handler.add(event) {
            Err(StoreError::QuotaExhausted { requested, limit })
                if persistence == Persistence::Critical =>
            {
                match self.registry.evict_oldest(Persistence::Normal, &self.quota)? {
                    Some(freed) => {
                        warn!(
                            freed_bytes = freed,
                            "evicted oldest normal segment under quota pressure"
                        );
                        handler.add(event)
                    }
                    None => {
                        warn!(
                            requested_bytes = requested,
                            "quota exhausted with nothing evictable; dropping critical event"
                        );
                        Err(StoreError::QuotaExhausted { requested, limit })
                    }
                }
            }
            Err(e @ StoreError::QuotaExhausted { .. }) => {
                warn!("quota exhausted; dropping normal event");
                Err(e)
            }
            other => other,
        }
    }

    /// The handler for one priority class.
    pub fn handler(&self, persistence: Persistence) -> &PriorityEventHandler {
        match persistence {
            Persistence::Normal => &self.normal,
            Persistence::Critical => &self.critical,
        }
    }

    /// Lease every drainable closed segment, critical-priority first.
    pub fn segments_for_draining(&self) -> Result<Vec<Arc<ClosedSegment>>> {
        let mut segments = self.critical.segments_for_draining()?;
        segments.extend(self.normal.segments_for_draining()?);
        Ok(segments)
    }

    /// Flush and close both active segments. Every event accepted before
    /// this call is durable and drainable afterwards.
    pub fn close(&self) -> Result<()> {
        self.normal.close()?;
        self.critical.close()?;
        Ok(())
    }

    /// The shared quota tracker.
    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    /// The shared segment registry.
    pub fn registry(&self) -> &SegmentRegistry {
        &self.registry
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn small_config() -> StoreConfig {
        StoreConfig::default()
            .with_quota_bytes(4 * 1024)
            .with_segment_max_bytes(128)
            .with_segment_max_events(8)
            .with_normal_flush_events(1)
    }

    #[test]
    fn test_add_routes_by_priority() {
        let dir = TempDir::new().unwrap();
        let store = EventStore::open(dir.path(), small_config()).unwrap();

        store.add(Persistence::Normal, "normal-event").unwrap();
        store.add(Persistence::Critical, "critical-event").unwrap();
        store.close().unwrap();

        let segments = store.segments_for_draining().unwrap();
        assert_eq!(segments.len(), 2);
        // Critical segments are handed out first.
        assert_eq!(segments[0].priority(), Persistence::Critical);
        assert_eq!(segments[1].priority(), Persistence::Normal);
    }

    #[test]
    fn test_registry_orders_by_age() {
        let registry = SegmentRegistry::new();
        let dir = TempDir::new().unwrap();
        for i in 1..=3 {
            let path = dir.path().join(crate::segment::segment_file_name(i));
            std::fs::write(&path, b"x\n").unwrap();
            registry.register(Arc::new(ClosedSegment::new(
                path,
                Persistence::Normal,
                2,
            )));
        }

        let quota = QuotaTracker::new(1024);
        quota.charge(6);
        let freed = registry
            .evict_oldest(Persistence::Normal, &quota)
            .unwrap()
            .unwrap();
        assert_eq!(freed, 2);
        assert_eq!(registry.len(), 2);
        // The oldest (lowest-index) file is the one gone.
        assert!(!dir.path().join("seg-00000001.log").exists());
        assert!(dir.path().join("seg-00000002.log").exists());
    }

    #[test]
    fn test_evict_skips_leased_and_foreign_priority() {
        let registry = SegmentRegistry::new();
        let dir = TempDir::new().unwrap();

        let critical_path = dir.path().join("seg-00000001.log");
        std::fs::write(&critical_path, b"c\n").unwrap();
        registry.register(Arc::new(ClosedSegment::new(
            critical_path,
            Persistence::Critical,
            2,
        )));

        let leased_path = dir.path().join("seg-00000002.log");
        std::fs::write(&leased_path, b"n\n").unwrap();
        let leased = Arc::new(ClosedSegment::new(leased_path, Persistence::Normal, 2));
        assert!(leased.try_lease());
        registry.register(leased);

        let quota = QuotaTracker::new(1024);
        assert!(registry
            .evict_oldest(Persistence::Normal, &quota)
            .unwrap()
            .is_none());
    }
}
