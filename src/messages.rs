//! JSON message types for a presentation layer.
//!
//! A UI (web page, MQTT bridge, terminal) sends [`TrackCommand`]s and reads
//! [`StationSnapshot`]s. Both are plain `serde` types; these helpers use
//! `serde_json`.
//!
//! # Example
//!
//! ```
//! use train_station::messages::{parse_track_command, TrackCommand};
//!
//! let json = br#"{"action": "speed", "address": "AA:BB", "track_id": 1, "speed": 0.5}"#;
//! let cmd = parse_track_command(json).unwrap();
//! assert_eq!(cmd.key().track_id, 1);
//! assert!(matches!(cmd, TrackCommand::Speed { speed, .. } if speed == 0.5));
//! ```

use serde::{Deserialize, Serialize};

use crate::address::{DeviceAddress, TrackKey};
use crate::connection::{ConnectionManager, StationSnapshot};
use crate::error::StationResult;
use crate::traits::Transport;

// ============================================================================
// Request Types
// ============================================================================

/// A command aimed at one track.
///
/// # JSON Examples
///
/// ```json
/// {"action": "acquire", "address": "AA:BB", "track_id": 1}
/// {"action": "release", "address": "AA:BB", "track_id": 1}
/// {"action": "speed", "address": "AA:BB", "track_id": 1, "speed": 0.75}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TrackCommand {
    /// Request command authority.
    Acquire {
        /// Device address.
        address: DeviceAddress,
        /// Track id on that device.
        track_id: u32,
    },
    /// Give command authority back.
    Release {
        /// Device address.
        address: DeviceAddress,
        /// Track id on that device.
        track_id: u32,
    },
    /// Request a normalized speed.
    Speed {
        /// Device address.
        address: DeviceAddress,
        /// Track id on that device.
        track_id: u32,
        /// Target speed (0.0 to 1.0)
        speed: f32,
    },
}

impl TrackCommand {
    /// The targeted track.
    pub fn key(&self) -> TrackKey {
        match self {
            TrackCommand::Acquire { address, track_id }
            | TrackCommand::Release { address, track_id }
            | TrackCommand::Speed {
                address, track_id, ..
            } => TrackKey::new(address.clone(), *track_id),
        }
    }

    /// Run the command against a manager.
    pub fn apply<T: Transport>(
        &self,
        manager: &mut ConnectionManager<T>,
        now_ms: u64,
    ) -> StationResult<()> {
        let key = self.key();
        match self {
            TrackCommand::Acquire { .. } => manager.acquire(&key),
            TrackCommand::Release { .. } => manager.release(&key),
            TrackCommand::Speed { speed, .. } => {
                manager.request_speed(&key, *speed, now_ms).map(|_| ())
            }
        }
    }
}

/// Parse a track command from JSON bytes.
///
/// Returns `None` for malformed JSON or an unknown action.
pub fn parse_track_command(json: &[u8]) -> Option<TrackCommand> {
    serde_json::from_slice(json).ok()
}

// ============================================================================
// Response Types
// ============================================================================

/// Render a snapshot as JSON.
pub fn snapshot_json(snapshot: &StationSnapshot) -> serde_json::Result<String> {
    serde_json::to_string(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StationConfig;
    use crate::frame::Frame;
    use crate::hal::MockTransport;
    use crate::track::TrackDefinition;

    #[test]
    fn parse_each_action() {
        let acquire = parse_track_command(br#"{"action":"acquire","address":"AA","track_id":2}"#);
        assert_eq!(
            acquire,
            Some(TrackCommand::Acquire {
                address: "AA".into(),
                track_id: 2
            })
        );

        let release = parse_track_command(br#"{"action":"release","address":"AA","track_id":2}"#);
        assert!(matches!(release, Some(TrackCommand::Release { .. })));

        let speed =
            parse_track_command(br#"{"action":"speed","address":"AA","track_id":2,"speed":0.25}"#);
        assert_eq!(speed.map(|c| c.key()), Some(TrackKey::new("AA", 2)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_track_command(b"not json").is_none());
        assert!(parse_track_command(br#"{"action":"derail","address":"AA","track_id":1}"#).is_none());
        assert!(parse_track_command(br#"{"action":"speed","address":"AA","track_id":1}"#).is_none());
    }

    #[test]
    fn command_serializes_with_action_tag() {
        let cmd = TrackCommand::Release {
            address: "AA".into(),
            track_id: 3,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains(r#""action":"release""#));
        assert!(json.contains(r#""address":"AA""#));
    }

    #[test]
    fn apply_sends_frames() {
        let mut manager = ConnectionManager::new(MockTransport::new(), StationConfig::default());
        manager.on_connected("AA".into(), "ESP train");
        let caps = Frame::Capabilities {
            definitions: vec![TrackDefinition::new(1, "Loco1")],
        };
        manager.on_bytes_received(&"AA".into(), &caps.encode(), 0);

        let cmd = TrackCommand::Acquire {
            address: "AA".into(),
            track_id: 1,
        };
        cmd.apply(&mut manager, 0).unwrap();
        assert_eq!(
            manager.transport().sent_frames(),
            vec![Frame::AcquireTrack { track_id: 1 }]
        );
    }

    #[test]
    fn snapshot_renders_tracks() {
        let mut manager = ConnectionManager::new(MockTransport::new(), StationConfig::default());
        manager.on_connected("AA".into(), "ESP train");
        let caps = Frame::Capabilities {
            definitions: vec![TrackDefinition::new(1, "Loco1")],
        };
        manager.on_bytes_received(&"AA".into(), &caps.encode(), 0);

        let json = snapshot_json(&manager.snapshot()).unwrap();
        assert!(json.contains(r#""devices":["ESP train"]"#));
        assert!(json.contains(r#""label":"Loco1""#));
        assert!(json.contains(r#""linked":false"#));
    }
}
