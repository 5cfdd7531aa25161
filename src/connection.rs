//! Device registry, liveness sweep and reconnection.
//!
//! [`ConnectionManager`] is the entry point of the core. The transport feeds
//! it connect/disconnect/bytes events, the event loop calls
//! [`tick`](ConnectionManager::tick) with the current time, and the
//! presentation layer reads device and track lists and issues track commands.
//! Everything runs on one execution context; nothing here blocks or locks.
//!
//! # Per-address lifecycle
//!
//! ```text
//! Discovered ─▶ Connecting ─▶ Alive ⇄ Suspect ─▶ ReconnectPending ─▶ Connecting
//!                   │                                   ▲
//!                   └──(connect refused)──▶ Disconnected ┘ (next discovery)
//! ```
//!
//! A new connection starts `Suspect`. A ping makes it `Alive` and each sweep
//! turns `Alive` back into `Suspect`. A device still `Suspect` at a sweep has
//! not pinged for a whole interval and is disconnected like any other
//! disconnect.
//!
//! # Example
//!
//! ```rust
//! use train_station::{ConnectionManager, Frame, StationConfig, TrackDefinition, TrackKey};
//! use train_station::hal::MockTransport;
//!
//! let mut manager = ConnectionManager::new(MockTransport::new(), StationConfig::default());
//! let addr = "AA:BB".into();
//!
//! manager.on_connected("AA:BB".into(), "ESP train");
//! let caps = Frame::Capabilities { definitions: vec![TrackDefinition::new(1, "Loco1")] };
//! manager.on_bytes_received(&addr, &caps.encode(), 0);
//!
//! assert_eq!(manager.devices(), ["ESP train".to_string()]);
//! assert_eq!(manager.tracks()[0].label, "Loco1");
//!
//! manager.acquire(&TrackKey::new("AA:BB", 1)).unwrap();
//! ```

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info, warn};

use crate::address::{DeviceAddress, TrackKey};
use crate::config::StationConfig;
use crate::error::{StationError, StationResult};
use crate::events::{EventQueue, StationEvent};
use crate::session::DeviceSession;
use crate::timer::PeriodicTimer;
use crate::track::{Capabilities, Direction, Position, Track};
use crate::traits::{DeviceInfo, Transport};

/// Where an address is in its connection lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConnectionPhase {
    /// Never seen, or removed.
    #[default]
    Unknown,
    /// Reported by discovery, not yet connecting.
    Discovered,
    /// Connect requested.
    Connecting,
    /// Connected and pinged during the current epoch.
    Alive,
    /// Connected, no ping yet this epoch.
    Suspect,
    /// Disconnected with no reconnect planned.
    Disconnected,
    /// Disconnected; the next sweep will try to reconnect.
    ReconnectPending,
}

impl ConnectionPhase {
    /// Whether a session exists for this phase.
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionPhase::Alive | ConnectionPhase::Suspect)
    }
}

/// Read-only view of one track for the presentation layer.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackSnapshot {
    /// Device address and track id.
    pub key: TrackKey,
    /// Human-readable name.
    pub label: String,
    /// Declared features.
    pub capabilities: Capabilities,
    /// Current direction.
    pub direction: Direction,
    /// Normalized speed in `[0, 1]`.
    pub speed: f32,
    /// Speed as reported on the wire.
    pub raw_speed: i32,
    /// Device-defined counter.
    pub count: u32,
    /// Position along the layout.
    pub position: Position,
    /// Whether command authority is held.
    pub linked: bool,
}

impl TrackSnapshot {
    /// Capture a track's current state.
    pub fn new(address: &DeviceAddress, track: &Track) -> Self {
        Self {
            key: TrackKey::new(address.clone(), track.id()),
            label: track.label().to_string(),
            capabilities: track.capabilities(),
            direction: track.direction(),
            speed: track.speed(),
            raw_speed: track.state().speed,
            count: track.count(),
            position: track.position(),
            linked: track.linked(),
        }
    }
}

/// Device list and every track, captured together.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StationSnapshot {
    /// Connected device names.
    pub devices: Vec<String>,
    /// Tracks ordered by address then id.
    pub tracks: Vec<TrackSnapshot>,
}

/// Registry of connected devices and their tracks.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    config: StationConfig,
    sessions: HashMap<DeviceAddress, DeviceSession>,
    phases: HashMap<DeviceAddress, ConnectionPhase>,
    devices: Vec<String>,
    pending_reconnect: BTreeSet<DeviceAddress>,
    sweep_timer: PeriodicTimer,
    events: EventQueue,
}

impl<T: Transport> ConnectionManager<T> {
    /// Create a manager with no devices.
    pub fn new(transport: T, config: StationConfig) -> Self {
        Self {
            transport,
            sweep_timer: PeriodicTimer::new(config.sweep_interval_ms),
            config,
            sessions: HashMap::new(),
            phases: HashMap::new(),
            devices: Vec::new(),
            pending_reconnect: BTreeSet::new(),
            events: EventQueue::new(),
        }
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Active configuration.
    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    fn set_phase(&mut self, address: &DeviceAddress, phase: ConnectionPhase) {
        self.phases.insert(address.clone(), phase);
    }

    // ------------------------------------------------------------------------
    // Transport events
    // ------------------------------------------------------------------------

    /// A device showed up in discovery. Connects if the policy accepts it.
    pub fn on_discovered(&mut self, info: &DeviceInfo) {
        if self.sessions.contains_key(&info.address) {
            return;
        }
        if !self.config.discovery.accepts(info) {
            debug!(address = %info.address, name = %info.name, "ignoring discovered device");
            self.set_phase(&info.address, ConnectionPhase::Discovered);
            return;
        }
        self.request_connect(&info.address);
    }

    fn request_connect(&mut self, address: &DeviceAddress) {
        self.set_phase(address, ConnectionPhase::Connecting);
        if let Err(e) = self.transport.connect(address) {
            warn!(address = %address, error = %e, "connect request failed");
            self.set_phase(address, ConnectionPhase::Disconnected);
        }
    }

    /// The transport opened a stream to `address`.
    pub fn on_connected(&mut self, address: DeviceAddress, display_name: impl Into<String>) {
        let display_name = display_name.into();
        info!(address = %address, name = %display_name, "connected");

        if self.sessions.contains_key(&address) {
            warn!(address = %address, "replacing existing session");
            self.drop_session(&address);
        }

        self.pending_reconnect.remove(&address);
        self.set_phase(&address, ConnectionPhase::Suspect);
        self.devices.push(display_name.clone());
        let session = DeviceSession::new(address.clone(), display_name, self.config.debounce_ms);
        self.sessions.insert(address, session);
        self.events.push(StationEvent::DevicesChanged);
    }

    /// The transport closed the stream to `address`. Queues a reconnect.
    pub fn on_disconnected(&mut self, address: &DeviceAddress, display_name: &str) {
        if !self.sessions.contains_key(address) {
            debug!(address = %address, name = display_name, "disconnect for unknown device");
            return;
        }
        info!(address = %address, name = display_name, "disconnected");
        self.drop_session(address);
        self.pending_reconnect.insert(address.clone());
        self.set_phase(address, ConnectionPhase::ReconnectPending);
    }

    /// The device is gone from the adapter. No reconnect is attempted.
    pub fn on_removed(&mut self, address: &DeviceAddress) {
        if self.sessions.contains_key(address) {
            info!(address = %address, "device removed");
            self.drop_session(address);
        }
        self.pending_reconnect.remove(address);
        self.phases.remove(address);
    }

    fn drop_session(&mut self, address: &DeviceAddress) {
        let Some(session) = self.sessions.remove(address) else {
            return;
        };
        let name = session.display_name();
        if let Some(i) = self.devices.iter().position(|d| d == name) {
            self.devices.remove(i);
        }
        self.events.push(StationEvent::DevicesChanged);
        self.events.push(StationEvent::TracksChanged);
    }

    /// Bytes arrived from `address`; one buffer is one frame.
    ///
    /// Also advances timers to `now_ms`.
    pub fn on_bytes_received(&mut self, address: &DeviceAddress, bytes: &[u8], now_ms: u64) {
        let Some(session) = self.sessions.get_mut(address) else {
            warn!(address = %address, len = bytes.len(), "bytes from unknown device");
            return;
        };
        session.on_frame_received(bytes, &mut self.transport, &mut self.events);
        if session.is_alive() {
            self.phases.insert(address.clone(), ConnectionPhase::Alive);
        }
        self.tick(now_ms);
    }

    // ------------------------------------------------------------------------
    // Liveness
    // ------------------------------------------------------------------------

    /// Advance timers to `now_ms`, sweeping if a period has elapsed.
    ///
    /// Returns whether a sweep ran.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        if self.sweep_timer.poll(now_ms) {
            self.sweep();
            true
        } else {
            false
        }
    }

    /// Run one liveness sweep, then one reconnect attempt per pending address.
    pub fn sweep(&mut self) {
        let mut silent = Vec::new();
        for (address, session) in self.sessions.iter_mut() {
            if session.is_alive() {
                session.clear_alive();
                self.phases.insert(address.clone(), ConnectionPhase::Suspect);
            } else {
                silent.push(address.clone());
            }
        }

        for address in silent {
            warn!(address = %address, "no ping during sweep interval, disconnecting");
            if let Err(e) = self.transport.disconnect(&address) {
                warn!(address = %address, error = %e, "disconnect request failed");
            }
            self.drop_session(&address);
            self.pending_reconnect.insert(address.clone());
            self.set_phase(&address, ConnectionPhase::ReconnectPending);
        }

        for address in core::mem::take(&mut self.pending_reconnect) {
            info!(address = %address, "attempting reconnect");
            self.request_connect(&address);
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Display names of connected devices, one per connection, in connection order.
    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    /// Every track on every device, ordered by address then id.
    pub fn tracks(&self) -> Vec<TrackSnapshot> {
        let mut tracks: Vec<TrackSnapshot> = self
            .sessions
            .values()
            .flat_map(|session| {
                session
                    .tracks()
                    .map(move |track| TrackSnapshot::new(session.address(), track))
            })
            .collect();
        tracks.sort_by(|a, b| a.key.cmp(&b.key));
        tracks
    }

    /// One track, if present.
    pub fn track(&self, key: &TrackKey) -> Option<TrackSnapshot> {
        let session = self.sessions.get(&key.address)?;
        session
            .track(key.track_id)
            .map(|track| TrackSnapshot::new(session.address(), track))
    }

    /// Devices and tracks in one value.
    pub fn snapshot(&self) -> StationSnapshot {
        StationSnapshot {
            devices: self.devices.clone(),
            tracks: self.tracks(),
        }
    }

    /// Session for an address, if connected.
    pub fn session(&self, address: &DeviceAddress) -> Option<&DeviceSession> {
        self.sessions.get(address)
    }

    /// Lifecycle phase of an address.
    pub fn phase(&self, address: &DeviceAddress) -> ConnectionPhase {
        self.phases.get(address).copied().unwrap_or_default()
    }

    /// Whether the next sweep will try to reconnect `address`.
    pub fn is_reconnect_pending(&self, address: &DeviceAddress) -> bool {
        self.pending_reconnect.contains(address)
    }

    /// Take all pending change notifications.
    pub fn drain_events(&mut self) -> Vec<StationEvent> {
        self.events.drain()
    }

    // ------------------------------------------------------------------------
    // Track commands
    // ------------------------------------------------------------------------

    /// Ask for command authority over a track.
    pub fn acquire(&mut self, key: &TrackKey) -> StationResult<()> {
        let session = self
            .sessions
            .get_mut(&key.address)
            .ok_or_else(|| StationError::UnknownDevice(key.address.clone()))?;
        session.acquire(key.track_id, &mut self.transport)
    }

    /// Give command authority over a track back.
    pub fn release(&mut self, key: &TrackKey) -> StationResult<()> {
        let session = self
            .sessions
            .get_mut(&key.address)
            .ok_or_else(|| StationError::UnknownDevice(key.address.clone()))?;
        session.release(key.track_id, &mut self.transport)
    }

    /// Request a normalized speed in `[0, 1]`. Returns whether a command was sent.
    pub fn request_speed(&mut self, key: &TrackKey, speed: f32, now_ms: u64) -> StationResult<bool> {
        let session = self
            .sessions
            .get_mut(&key.address)
            .ok_or_else(|| StationError::UnknownDevice(key.address.clone()))?;
        session.request_speed(key.track_id, speed, now_ms, &mut self.transport)
    }
}
