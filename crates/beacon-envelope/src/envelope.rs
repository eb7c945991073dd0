//! Envelope assembly and the two schema renderings.
//!
//! `EnvelopeBuilder::populate` produces one pre-transform [`Envelope`];
//! [`Envelope::to_current`] and [`Envelope::to_legacy`] are two renderings
//! of that same state, not independent code paths; the sequence stamp,
//! sensitivity transforms, and flags are computed exactly once.
//!
//! Construction never fails for the caller: missing optional context
//! degrades gracefully (absent cV renders empty, absent iKey renders as an
//! empty field).

use std::collections::BTreeMap;
use std::sync::Arc;

use beacon_common::{EnvelopeConfig, EventDescriptor, Latency, Persistence};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::flags::compute_flags;
use crate::sensitivity::{
    SensitiveFields, Sensitivity, SensitivitySet, SensitivityTransformer,
};
use crate::sequence::SequenceService;
use crate::{CURRENT_SCHEMA_VERSION, LEGACY_SCHEMA_VERSION};

/// A fully-populated envelope, pre-rendering.
///
/// Holds the post-transform field state shared by both schema variants.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Qualified event name.
    pub name: String,
    /// UTC timestamp of envelope construction.
    pub time: DateTime<Utc>,
    /// Instrumentation key; empty when none was configured.
    pub ikey: String,
    /// Pop-sample rate, caller-supplied pass-through.
    pub pop_sample: u32,
    /// The additive flags bitfield.
    pub flags: u32,
    /// Sensitivity-transformed correlation and identity fields.
    pub fields: SensitiveFields,
    /// Operating system name.
    pub os_name: String,
    /// Operating system version.
    pub os_version: String,
    /// Host application id.
    pub app_id: String,
    /// Host application version.
    pub app_version: String,
    /// Opaque serialized event payload.
    pub payload: String,
}

impl Envelope {
    /// The envelope timestamp rendered RFC 3339 with millisecond precision.
    pub fn time_rendered(&self) -> String {
        self.time.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Render the current ("2.1") schema variant.
    pub fn to_current(&self) -> CurrentEnvelope {
        CurrentEnvelope {
            ver: CURRENT_SCHEMA_VERSION.to_string(),
            name: self.name.clone(),
            time: self.time_rendered(),
            pop_sample: self.pop_sample,
            ikey: self.ikey.clone(),
            flags: self.flags,
            cv: self.fields.cv.clone(),
            epoch: self.fields.epoch.clone(),
            seq_num: self.fields.seq_num,
            os: self.os_name.clone(),
            os_ver: self.os_version.clone(),
            app_id: self.app_id.clone(),
            app_ver: self.app_version.clone(),
            ext: ExtensionMap {
                device: DeviceExtension {
                    local_id: self.fields.device_local_id.clone(),
                },
                user: UserExtension {
                    local_id: self.fields.user_local_id.clone(),
                },
            },
            data: self.payload.clone(),
        }
    }

    /// Render the legacy (numeric-version) schema variant.
    pub fn to_legacy(&self) -> LegacyEnvelope {
        let mut tags = BTreeMap::new();
        if !self.fields.cv.is_empty() {
            tags.insert("cV".to_string(), self.fields.cv.clone());
        }
        LegacyEnvelope {
            ver: LEGACY_SCHEMA_VERSION,
            name: self.name.clone(),
            time: self.time_rendered(),
            sample_rate: self.pop_sample,
            seq: self.fields.seq_rendered.clone(),
            ikey: self.ikey.clone(),
            flags: self.flags,
            os: self.os_name.clone(),
            os_ver: self.os_version.clone(),
            app_id: self.app_id.clone(),
            app_ver: self.app_version.clone(),
            device_id: self.fields.device_local_id.clone(),
            user_id: self.fields.user_local_id.clone(),
            tags,
            data: self.payload.clone(),
        }
    }
}

/// The current ("2.1") wire rendering with nested extensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentEnvelope {
    pub ver: String,
    pub name: String,
    pub time: String,
    #[serde(rename = "popSample")]
    pub pop_sample: u32,
    #[serde(rename = "iKey")]
    pub ikey: String,
    pub flags: u32,
    #[serde(rename = "cV")]
    pub cv: String,
    pub epoch: String,
    #[serde(rename = "seqNum")]
    pub seq_num: u64,
    pub os: String,
    #[serde(rename = "osVer")]
    pub os_ver: String,
    #[serde(rename = "appId")]
    pub app_id: String,
    #[serde(rename = "appVer")]
    pub app_ver: String,
    pub ext: ExtensionMap,
    pub data: String,
}

/// Nested extension records of the current schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionMap {
    pub device: DeviceExtension,
    pub user: UserExtension,
}

/// Device extension record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceExtension {
    #[serde(rename = "localId")]
    pub local_id: String,
}

/// User extension record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserExtension {
    #[serde(rename = "localId")]
    pub local_id: String,
}

/// The legacy wire rendering with flat identity fields and a tags map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyEnvelope {
    pub ver: u32,
    pub name: String,
    pub time: String,
    #[serde(rename = "sampleRate")]
    pub sample_rate: u32,
    pub seq: String,
    #[serde(rename = "iKey")]
    pub ikey: String,
    pub flags: u32,
    pub os: String,
    #[serde(rename = "osVer")]
    pub os_ver: String,
    #[serde(rename = "appId")]
    pub app_id: String,
    #[serde(rename = "appVer")]
    pub app_ver: String,
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    pub data: String,
}

/// Assembles envelopes from application events.
///
/// One builder per SDK instance; the sequence service is shared across
/// builders and priority classes so stamps stay globally contiguous.
#[derive(Debug)]
pub struct EnvelopeBuilder {
    config: EnvelopeConfig,
    sequence: Arc<SequenceService>,
    transformer: SensitivityTransformer,
}

impl EnvelopeBuilder {
    /// Create a builder over a shared sequence service.
    pub fn new(config: EnvelopeConfig, sequence: Arc<SequenceService>) -> Self {
        EnvelopeBuilder {
            config,
            sequence,
            transformer: SensitivityTransformer::new(),
        }
    }

    /// Populate an envelope for one event.
    ///
    /// Stamps the next sequence number, runs the sensitivity transform over
    /// the governed fields, and computes the flags bitfield. Never fails:
    /// `cv: None` and `sample_rate: 0` are valid degraded inputs.
    pub fn populate(
        &self,
        event: &EventDescriptor,
        cv: Option<&str>,
        sample_rate: u32,
        persistence: Persistence,
        latency: Latency,
        sensitivities: &[Sensitivity],
    ) -> Envelope {
        let stamp = self.sequence.next();
        let set = SensitivitySet::from_slice(sensitivities);
        let flags = compute_flags(persistence, latency, set);

        let context = &self.config.context;
        let fields = SensitiveFields::new(
            cv,
            &stamp,
            &context.device_local_id,
            &context.user_local_id,
        );
        let fields = self.transformer.apply(set, fields);

        if set.mutates_fields() {
            trace!(
                event = %event.name,
                seq = stamp.seq_num,
                hash = set.hash,
                drop = set.drop,
                "applied sensitivity transform"
            );
        }

        Envelope {
            name: event.name.clone(),
            time: Utc::now(),
            ikey: self.config.ikey_or_empty().to_string(),
            pop_sample: sample_rate,
            flags,
            fields,
            os_name: context.os_name.clone(),
            os_version: context.os_version.clone(),
            app_id: context.app_id.clone(),
            app_version: context.app_version.clone(),
            payload: event.payload.clone(),
        }
    }

    /// The session id this builder stamps envelopes with.
    pub fn session_id(&self) -> &beacon_common::SessionId {
        self.sequence.session_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_common::DeviceContext;

    fn sample_context() -> DeviceContext {
        DeviceContext {
            os_name: "Linux".to_string(),
            os_version: "6.1".to_string(),
            app_id: "com.example.app".to_string(),
            app_version: "1.2.3".to_string(),
            device_local_id: "device-1234".to_string(),
            user_local_id: "user-5678".to_string(),
        }
    }

    fn sample_builder(ikey: Option<&str>) -> EnvelopeBuilder {
        let config = EnvelopeConfig {
            ikey: ikey.map(str::to_string),
            context: sample_context(),
        };
        EnvelopeBuilder::new(config, Arc::new(SequenceService::new()))
    }

    fn sample_event() -> EventDescriptor {
        EventDescriptor::new("com.example.app.pageview", r#"{"page":"home"}"#)
    }

    #[test]
    fn test_ikey_is_stamped() {
        let builder = sample_builder(Some("testikey"));
        let envelope = builder.populate(
            &sample_event(),
            None,
            0,
            Persistence::Normal,
            Latency::Normal,
            &[],
        );
        assert_eq!(envelope.ikey, "testikey");
        assert_eq!(envelope.to_current().ikey, "testikey");
        assert_eq!(envelope.to_legacy().ikey, "testikey");
    }

    #[test]
    fn test_absent_ikey_renders_empty() {
        let builder = sample_builder(None);
        let envelope = builder.populate(
            &sample_event(),
            None,
            0,
            Persistence::Normal,
            Latency::Normal,
            &[],
        );
        assert_eq!(envelope.ikey, "");
    }

    #[test]
    fn test_current_rendering_fields() {
        let builder = sample_builder(Some("iKey"));
        let envelope = builder.populate(
            &sample_event(),
            Some("cv"),
            10,
            Persistence::Normal,
            Latency::Normal,
            &[],
        );
        let current = envelope.to_current();

        assert_eq!(current.ver, "2.1");
        assert!(!current.name.is_empty());
        assert!(!current.time.is_empty());
        assert_eq!(current.pop_sample, 10);
        assert_ne!(current.seq_num, 0);
        assert_eq!(current.flags, 0x101);
        assert_eq!(current.cv, "cv");
        assert!(!current.epoch.is_empty());
        assert_eq!(current.os, "Linux");
        assert_eq!(current.os_ver, "6.1");
        assert_eq!(current.app_id, "com.example.app");
        assert_eq!(current.app_ver, "1.2.3");
        assert_eq!(current.ext.device.local_id, "device-1234");
        assert_eq!(current.ext.user.local_id, "user-5678");
        assert_eq!(current.data, r#"{"page":"home"}"#);
    }

    #[test]
    fn test_legacy_rendering_fields() {
        let builder = sample_builder(Some("iKey"));
        let envelope = builder.populate(
            &sample_event(),
            Some("cv"),
            10,
            Persistence::Normal,
            Latency::Normal,
            &[],
        );
        let legacy = envelope.to_legacy();

        assert_eq!(legacy.ver, 1);
        assert!(!legacy.name.is_empty());
        assert!(!legacy.time.is_empty());
        assert_eq!(legacy.sample_rate, 10);
        assert!(!legacy.seq.is_empty());
        assert_eq!(legacy.flags, 0x101);
        assert_eq!(legacy.tags.get("cV"), Some(&"cv".to_string()));
        assert_eq!(legacy.device_id, "device-1234");
        assert_eq!(legacy.user_id, "user-5678");
        assert_eq!(legacy.os, "Linux");
    }

    #[test]
    fn test_renderings_share_one_state() {
        let builder = sample_builder(Some("iKey"));
        let envelope = builder.populate(
            &sample_event(),
            Some("cv"),
            0,
            Persistence::Critical,
            Latency::RealTime,
            &[],
        );
        let current = envelope.to_current();
        let legacy = envelope.to_legacy();

        assert_eq!(current.name, legacy.name);
        assert_eq!(current.time, legacy.time);
        assert_eq!(current.flags, legacy.flags);
        // Legacy seq is the structured epoch:seqNum rendered as one string.
        assert_eq!(
            legacy.seq,
            format!("{}:{}", current.epoch, current.seq_num)
        );
    }

    #[test]
    fn test_current_json_field_names() {
        let builder = sample_builder(Some("iKey"));
        let envelope = builder.populate(
            &sample_event(),
            Some("cv"),
            10,
            Persistence::Normal,
            Latency::Normal,
            &[],
        );
        let json = serde_json::to_value(envelope.to_current()).unwrap();

        assert_eq!(json["ver"], "2.1");
        assert_eq!(json["popSample"], 10);
        assert_eq!(json["iKey"], "iKey");
        assert_eq!(json["cV"], "cv");
        assert!(json["seqNum"].as_u64().unwrap() > 0);
        assert!(json["ext"]["device"]["localId"].is_string());
        assert!(json["ext"]["user"]["localId"].is_string());
    }

    #[test]
    fn test_legacy_json_field_names() {
        let builder = sample_builder(Some("iKey"));
        let envelope = builder.populate(
            &sample_event(),
            Some("cv"),
            10,
            Persistence::Normal,
            Latency::Normal,
            &[],
        );
        let json = serde_json::to_value(envelope.to_legacy()).unwrap();

        assert_eq!(json["ver"], 1);
        assert_eq!(json["sampleRate"], 10);
        assert_eq!(json["tags"]["cV"], "cv");
        assert!(json["deviceId"].is_string());
        assert!(json["userId"].is_string());
    }

    #[test]
    fn test_sequence_increments_across_priorities() {
        let builder = sample_builder(Some("iKey"));
        let first = builder.populate(
            &sample_event(),
            None,
            0,
            Persistence::Normal,
            Latency::Normal,
            &[],
        );
        let second = builder.populate(
            &sample_event(),
            None,
            0,
            Persistence::Critical,
            Latency::RealTime,
            &[],
        );
        assert_eq!(
            second.fields.seq_num,
            first.fields.seq_num + 1
        );
        assert_eq!(first.fields.epoch, second.fields.epoch);
    }
}
