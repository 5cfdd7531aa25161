//! Integration tests for the JSON presentation messages.
//!
//! These tests drive the station the way a web or MQTT bridge would.

#![cfg(feature = "serde")]

use train_station::hal::MockTransport;
use train_station::{
    parse_track_command, snapshot_json, ConnectionManager, Frame, StationConfig, StationError,
    StationEvent, StationSnapshot, TrackDefinition, TrackKey,
};

fn create_station() -> ConnectionManager<MockTransport> {
    let mut station = ConnectionManager::new(MockTransport::new(), StationConfig::default());
    station.on_connected("AA:BB".into(), "ESP train");
    let caps = Frame::Capabilities {
        definitions: vec![TrackDefinition::new(1, "Loco1").with_max_speed(1000)],
    };
    station.on_bytes_received(&"AA:BB".into(), &caps.encode(), 0);
    station
}

#[test]
fn test_acquire_then_speed_via_json() {
    let mut station = create_station();

    let cmd = parse_track_command(br#"{"action":"acquire","address":"AA:BB","track_id":1}"#).unwrap();
    cmd.apply(&mut station, 0).unwrap();
    station.on_bytes_received(
        &"AA:BB".into(),
        &Frame::AcquireAck {
            track_id: 1,
            granted: true,
        }
        .encode(),
        10,
    );

    let cmd =
        parse_track_command(br#"{"action":"speed","address":"AA:BB","track_id":1,"speed":0.4}"#)
            .unwrap();
    cmd.apply(&mut station, 20).unwrap();

    assert_eq!(
        station.transport().sent_frames(),
        vec![
            Frame::AcquireTrack { track_id: 1 },
            Frame::SpeedCommand {
                track_id: 1,
                raw_speed: 400
            },
        ]
    );
}

#[test]
fn test_command_for_missing_device() {
    let mut station = create_station();
    let cmd = parse_track_command(br#"{"action":"release","address":"CC","track_id":1}"#).unwrap();
    assert_eq!(
        cmd.apply(&mut station, 0),
        Err(StationError::UnknownDevice("CC".into()))
    );
}

#[test]
fn test_snapshot_round_trips() {
    let station = create_station();
    let json = snapshot_json(&station.snapshot()).unwrap();
    let parsed: StationSnapshot = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed, station.snapshot());
    assert_eq!(parsed.tracks[0].key, TrackKey::new("AA:BB", 1));
}

#[test]
fn test_events_serialize_with_tag() {
    let event = StationEvent::TrackChanged {
        key: TrackKey::new("AA:BB", 1),
        change: train_station::TrackChange::Speed,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], "track_changed");
    assert_eq!(json["key"]["address"], "AA:BB");
    assert_eq!(json["change"], "speed");
}
