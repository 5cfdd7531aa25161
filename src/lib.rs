//! # train-station
//!
//! Controller core for remote model train track units reached over a serial
//! byte stream (for example Bluetooth RFCOMM).
//!
//! ## Features
//!
//! - **Binary wire protocol**: big-endian frames for pings, track declarations, state, and commands
//! - **Track model**: direction, speed, counter and position per track, with change notifications
//! - **Command authority**: acquire/release handshake per track, confirmed by the device
//! - **Speed debounce**: at most one speed command per track per debounce window
//! - **Liveness**: silent devices are disconnected by a periodic sweep and reconnected
//!
//! ## Architecture
//!
//! Everything runs on one execution context with explicit `now_ms` time:
//!
//! - `frame` - Wire codec
//! - `track` - Track data model and per-track state machine
//! - `session` - Per-device frame dispatch and write loop
//! - `connection` - Device registry, liveness sweep, reconnection
//! - `traits` - Transport and clock abstractions
//! - `hal` - Mock implementations for testing
//! - `services` - Tokio driver (`runtime` feature)
//!
//! ## Example
//!
//! ```rust
//! use train_station::{
//!     hal::MockTransport, ConnectionManager, Direction, Frame, Position, StationConfig,
//!     TrackDefinition, TrackKey, TrackState,
//! };
//!
//! let mut station = ConnectionManager::new(MockTransport::new(), StationConfig::default());
//! let addr = "AA:BB".into();
//!
//! // Transport reports the connection, then the device declares its tracks
//! station.on_connected("AA:BB".into(), "ESP train");
//! let caps = Frame::Capabilities { definitions: vec![TrackDefinition::new(1, "Loco1")] };
//! station.on_bytes_received(&addr, &caps.encode(), 0);
//!
//! // Device reports state
//! let state = Frame::TrackState {
//!     track_id: 1,
//!     state: TrackState { direction: Direction::Forward, speed: 2048, count: 5, position: Position::PassingBy },
//! };
//! station.on_bytes_received(&addr, &state.encode(), 10);
//!
//! let key = TrackKey::new("AA:BB", 1);
//! assert_eq!(station.track(&key).unwrap().speed, 0.5);
//!
//! // Take control and drive
//! station.acquire(&key).unwrap();
//! station.on_bytes_received(&addr, &Frame::AcquireAck { track_id: 1, granted: true }.encode(), 20);
//! assert!(station.request_speed(&key, 0.75, 30).unwrap());
//!
//! // Call regularly from the event loop
//! station.tick(50);
//! ```

#![warn(missing_docs)]

/// Device addresses and track keys.
pub mod address;
/// Station configuration.
pub mod config;
/// Device registry, liveness sweep and reconnection.
pub mod connection;
/// Error types.
pub mod error;
/// Change notifications for the presentation layer.
pub mod events;
/// Binary wire codec.
pub mod frame;
/// Mock implementations for testing.
pub mod hal;
/// Per-device session.
pub mod session;
/// Deadline timers driven by explicit time.
pub mod timer;
/// Track data model and per-track state machine.
pub mod track;
/// Transport and clock abstractions.
pub mod traits;

/// JSON presentation messages (serde-based).
#[cfg(feature = "serde")]
pub mod messages;

/// Tokio driver (feature-gated).
#[cfg(feature = "runtime")]
pub mod services;

// Re-exports for convenience
pub use address::{DeviceAddress, TrackKey};
pub use config::{DiscoveryConfig, StationConfig};
pub use connection::{ConnectionManager, ConnectionPhase, StationSnapshot, TrackSnapshot};
pub use error::{DecodeError, SendError, StationError, StationResult};
pub use events::{EventQueue, StationEvent};
pub use frame::{Frame, FrameType};
pub use session::DeviceSession;
pub use timer::{OneShotTimer, PeriodicTimer};
pub use track::{
    Capabilities, Direction, LinkState, Position, StateChanges, Track, TrackChange,
    TrackDefinition, TrackState, DEFAULT_MAX_SPEED,
};
pub use traits::{Clock, DeviceInfo, Transport};

// Message re-exports (for presentation layers)
#[cfg(feature = "serde")]
pub use messages::{parse_track_command, snapshot_json, TrackCommand};
