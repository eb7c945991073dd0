//! Full-pipeline tests: application event in, JSON envelope lines on
//! disk, drained back out in order.

use beacon_common::{
    DeviceContext, EnvelopeConfig, EventDescriptor, Latency, Persistence, StoreConfig,
};
use beacon_core::Beacon;
use beacon_envelope::{sha256_hex, Sensitivity};
use tempfile::TempDir;

fn envelope_config() -> EnvelopeConfig {
    EnvelopeConfig::new(
        "pipeline-ikey",
        DeviceContext {
            os_name: "Linux".to_string(),
            os_version: "6.1".to_string(),
            app_id: "com.example.host".to_string(),
            app_version: "2.0".to_string(),
            device_local_id: "device-42".to_string(),
            user_local_id: "user-42".to_string(),
        },
    )
}

#[test]
fn test_2000_events_roundtrip_in_order_with_contiguous_sequence() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::default().with_segment_max_events(100);
    let beacon = Beacon::open(dir.path(), envelope_config(), config).unwrap();

    for i in 0..2000 {
        let event = EventDescriptor::new("com.example.host.tick", format!(r#"{{"i":{}}}"#, i));
        beacon
            .log(&event, None, 0, Persistence::Normal, Latency::Normal, &[])
            .unwrap();
    }

    let segments = beacon.segments_for_draining().unwrap();
    assert!(segments.len() > 1, "2000 events should span rollovers");

    let mut seq_nums = Vec::new();
    let mut payload_index = 0u64;
    for segment in &segments {
        for line in segment.drain().unwrap() {
            let json: serde_json::Value = serde_json::from_str(&line).unwrap();
            assert_eq!(json["data"], format!(r#"{{"i":{}}}"#, payload_index));
            seq_nums.push(json["seqNum"].as_u64().unwrap());
            payload_index += 1;
        }
    }

    assert_eq!(payload_index, 2000, "no loss, no duplication");

    // Arrival order on disk is sequence order: a contiguous run from 1.
    assert_eq!(seq_nums[0], 1);
    for window in seq_nums.windows(2) {
        assert_eq!(window[1], window[0] + 1);
    }
}

#[test]
fn test_sensitivity_transforms_survive_persistence() {
    let dir = TempDir::new().unwrap();
    let beacon = Beacon::open(dir.path(), envelope_config(), StoreConfig::default()).unwrap();

    let event = EventDescriptor::new("com.example.host.login", "{}");
    beacon
        .log(
            &event,
            Some("trace-cv"),
            0,
            Persistence::Normal,
            Latency::Normal,
            &[Sensitivity::Hash],
        )
        .unwrap();
    beacon
        .log(
            &event,
            Some("trace-cv"),
            0,
            Persistence::Normal,
            Latency::Normal,
            &[Sensitivity::Drop],
        )
        .unwrap();

    let segments = beacon.segments_for_draining().unwrap();
    let lines: Vec<String> = segments
        .iter()
        .flat_map(|s| s.drain().unwrap())
        .collect();
    assert_eq!(lines.len(), 2);

    let hashed: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(hashed["flags"], 0x100101);
    assert_eq!(hashed["cV"], sha256_hex("trace-cv"));
    assert_eq!(
        hashed["ext"]["device"]["localId"],
        sha256_hex("device-42")
    );

    let dropped: serde_json::Value = serde_json::from_str(&lines[1]).unwrap();
    assert_eq!(dropped["flags"], 0x200101);
    assert_eq!(dropped["seqNum"], 0);
    assert_eq!(dropped["cV"], "");
    assert_eq!(dropped["epoch"], "");
    assert!(dropped["ext"]["device"]["localId"]
        .as_str()
        .unwrap()
        .starts_with("r:"));
    assert_eq!(dropped["ext"]["user"]["localId"], "");
}

#[test]
fn test_critical_event_displaces_normal_data_under_pressure() {
    let dir = TempDir::new().unwrap();
    // Tight quota so a handful of envelopes fills it.
    let config = StoreConfig::default()
        .with_quota_bytes(4 * 1024)
        .with_segment_max_bytes(1024)
        .with_segment_max_events(2)
        .with_normal_flush_events(1);
    let beacon = Beacon::open(dir.path(), envelope_config(), config).unwrap();

    let event = EventDescriptor::new("com.example.host.bulk", "x".repeat(256));
    let mut accepted = 0;
    loop {
        match beacon.log(&event, None, 0, Persistence::Normal, Latency::Normal, &[]) {
            Ok(()) => accepted += 1,
            Err(_) => break,
        }
        assert!(accepted < 100, "quota never filled");
    }
    beacon.store().handler(Persistence::Normal).close().unwrap();

    // The critical event gets in by evicting the oldest normal segment.
    beacon
        .log(&event, None, 0, Persistence::Critical, Latency::RealTime, &[])
        .unwrap();

    let critical_events: usize = beacon
        .store()
        .handler(Persistence::Critical)
        .segments_for_draining()
        .unwrap()
        .iter()
        .map(|s| s.drain().unwrap().len())
        .sum();
    assert_eq!(critical_events, 1);
}

#[test]
fn test_session_id_is_stable_per_pipeline() {
    let dir = TempDir::new().unwrap();
    let beacon = Beacon::open(dir.path(), envelope_config(), StoreConfig::default()).unwrap();

    let event = EventDescriptor::new("com.example.host.tick", "{}");
    for _ in 0..5 {
        beacon
            .log(&event, None, 0, Persistence::Normal, Latency::Normal, &[])
            .unwrap();
    }

    let session = beacon.session_id().to_string();
    let segments = beacon.segments_for_draining().unwrap();
    for segment in &segments {
        for line in segment.drain().unwrap() {
            let json: serde_json::Value = serde_json::from_str(&line).unwrap();
            assert_eq!(json["epoch"], session);
        }
    }
}
