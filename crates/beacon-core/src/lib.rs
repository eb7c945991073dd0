//! Beacon telemetry SDK façade.
//!
//! Wires the envelope pipeline to the priority event store: an
//! application event goes in, gets stamped (sequence, flags,
//! sensitivity transforms), is serialized to one JSON line, and lands in
//! the disk-backed segment of its priority class. An uploader later
//! leases closed segments, drains them, and discards them on successful
//! upload.
//!
//! ```no_run
//! use beacon_common::{DeviceContext, EnvelopeConfig, EventDescriptor, Latency, Persistence, StoreConfig};
//! use beacon_core::Beacon;
//!
//! let beacon = Beacon::open(
//!     "/var/lib/app/telemetry",
//!     EnvelopeConfig::new("my-ikey", DeviceContext::default()),
//!     StoreConfig::default(),
//! )?;
//!
//! let event = EventDescriptor::new("com.example.app.launch", r#"{"cold":true}"#);
//! beacon.log(&event, None, 0, Persistence::Normal, Latency::Normal, &[])?;
//!
//! for segment in beacon.segments_for_draining()? {
//!     let events = segment.drain()?;
//!     // ... upload, then on success:
//!     beacon.discard(&segment)?;
//! }
//! # Ok::<(), beacon_common::Error>(())
//! ```

pub mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use beacon_common::{
    EnvelopeConfig, Error, EventDescriptor, Latency, Persistence, Result, SessionId, StoreConfig,
};
use beacon_envelope::{EnvelopeBuilder, Sensitivity, SequenceService};
use beacon_store::{ClosedSegment, EventStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};

/// Which envelope rendering gets persisted and uploaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVariant {
    /// The current "2.1" schema with nested device/user extensions.
    #[default]
    Current,
    /// The legacy numeric-version schema with flat identity fields.
    Legacy,
}

/// The telemetry pipeline: envelope builder over the event store.
pub struct Beacon {
    builder: EnvelopeBuilder,
    store: EventStore,
    schema: SchemaVariant,
}

impl Beacon {
    /// Open a pipeline persisting the current schema variant.
    pub fn open(
        root: impl Into<PathBuf>,
        envelope_config: EnvelopeConfig,
        store_config: StoreConfig,
    ) -> Result<Self> {
        Self::open_with_schema(root, envelope_config, store_config, SchemaVariant::default())
    }

    /// Open a pipeline persisting the chosen schema variant.
    ///
    /// The sequence service is created here, once per pipeline, so every
    /// envelope of every priority class draws from one contiguous
    /// sequence.
    pub fn open_with_schema(
        root: impl Into<PathBuf>,
        envelope_config: EnvelopeConfig,
        store_config: StoreConfig,
        schema: SchemaVariant,
    ) -> Result<Self> {
        let store = EventStore::open(root, store_config)?;
        let sequence = Arc::new(SequenceService::new());
        let builder = EnvelopeBuilder::new(envelope_config, sequence);
        Ok(Beacon {
            builder,
            store,
            schema,
        })
    }

    /// Stamp, serialize, and durably buffer one application event.
    ///
    /// Missing optional inputs (`cv: None`, `sample_rate: 0`, no
    /// sensitivities) degrade gracefully and never fail the call; only
    /// storage admission can, in which case this single event is lost
    /// and the error says why.
    pub fn log(
        &self,
        event: &EventDescriptor,
        cv: Option<&str>,
        sample_rate: u32,
        persistence: Persistence,
        latency: Latency,
        sensitivities: &[Sensitivity],
    ) -> Result<()> {
        let envelope = self
            .builder
            .populate(event, cv, sample_rate, persistence, latency, sensitivities);
        let line = match self.schema {
            SchemaVariant::Current => serde_json::to_string(&envelope.to_current())?,
            SchemaVariant::Legacy => serde_json::to_string(&envelope.to_legacy())?,
        };
        debug!(
            name = %event.name,
            seq = envelope.fields.seq_num,
            flags = %format_args!("{:#x}", envelope.flags),
            %persistence,
            "logging event"
        );
        self.store.add(persistence, &line).map_err(Error::from)
    }

    /// Lease every drainable closed segment, critical-priority first.
    ///
    /// The caller drains each segment, uploads, and either discards it
    /// on success or releases it for a later retry.
    pub fn segments_for_draining(&self) -> Result<Vec<Arc<ClosedSegment>>> {
        self.store.segments_for_draining().map_err(Error::from)
    }

    /// Drop a drained segment: its file is deleted and its bytes return
    /// to the shared quota. Idempotent.
    pub fn discard(&self, segment: &ClosedSegment) -> Result<()> {
        segment.discard(self.store.quota()).map_err(Error::from)
    }

    /// Flush and close both active segments; used on orderly shutdown.
    /// Every event accepted by `log` is drainable afterwards.
    pub fn close(&self) -> Result<()> {
        self.store.close().map_err(Error::from)
    }

    /// The session id stamped into this process's envelopes.
    pub fn session_id(&self) -> &SessionId {
        self.builder.session_id()
    }

    /// Bytes currently charged against the storage quota.
    pub fn quota_used(&self) -> u64 {
        self.store.quota().used()
    }

    /// The underlying event store.
    pub fn store(&self) -> &EventStore {
        &self.store
    }
}
