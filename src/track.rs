//! Track definitions, live state and the per-track link state machine.
//!
//! A [`Track`] is created from a [`TrackDefinition`] announced by a device and
//! lives until that device's session goes away. It never sends anything on its
//! own: commands return the [`Frame`] to emit and the owning
//! [`DeviceSession`](crate::DeviceSession) writes it to the transport. State
//! changes are reported as [`TrackChange`] values, one per observable field.
//!
//! # Link handshake
//!
//! ```text
//!            acquire()                 AcquireAck(granted)
//! Unlinked ────────────▶ LinkPending ─────────────────────▶ Linked
//!    ▲                       │ AcquireAck(denied)              │
//!    └───────────────────────┘                                 │ release()
//!    ▲                                                         ▼
//!    └──────────────────────────────────────────────────── UnlinkPending
//!           ReleaseAck(granted)          ReleaseAck(denied) ──▶ Linked
//! ```
//!
//! The externally visible `linked` flag only changes when an acknowledgement
//! arrives, never optimistically on request.
//!
//! # Example
//!
//! ```rust
//! use train_station::{Frame, Track, TrackDefinition, Capabilities};
//!
//! let def = TrackDefinition::new(1, "Loco1")
//!     .with_max_speed(2048)
//!     .with_capabilities(Capabilities::SPEED_CONTROL);
//! let mut track = Track::new(def, 100);
//!
//! assert_eq!(track.acquire(), Frame::AcquireTrack { track_id: 1 });
//! track.on_acquire_ack(true);
//! assert!(track.linked());
//!
//! let cmd = track.request_speed(0.5, 0);
//! assert_eq!(cmd, Some(Frame::SpeedCommand { track_id: 1, raw_speed: 1024 }));
//! ```

use tracing::{debug, warn};

use crate::frame::Frame;
use crate::timer::OneShotTimer;

/// Max speed assumed when a device does not announce one.
pub const DEFAULT_MAX_SPEED: u32 = 4096;

// ============================================================================
// Capabilities
// ============================================================================

/// Set of named capability flags carried by a track definition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Capabilities(u16);

impl Capabilities {
    /// No capability.
    pub const NONE: Self = Self(0);
    /// Speed can be commanded.
    pub const SPEED_CONTROL: Self = Self(1 << 0);
    /// The track reports train position.
    pub const POSITIONING: Self = Self(1 << 1);

    const KNOWN: u16 = Self::SPEED_CONTROL.0 | Self::POSITIONING.0;

    /// Build from wire bits, dropping bits with no named flag.
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits & Self::KNOWN)
    }

    /// Wire bits.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Whether every flag in `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two sets.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether no flag is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl core::ops::BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

// ============================================================================
// Definition and State
// ============================================================================

/// Immutable description of a track, as announced in a `Capabilities` frame.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackDefinition {
    /// Device-local id.
    pub id: u32,
    /// Human-readable label.
    pub label: String,
    /// Raw speed value corresponding to full speed.
    pub max_speed: u32,
    /// What the track supports.
    pub capabilities: Capabilities,
}

impl TrackDefinition {
    /// Definition with default max speed and no capabilities.
    pub fn new(id: u32, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            max_speed: DEFAULT_MAX_SPEED,
            capabilities: Capabilities::NONE,
        }
    }

    /// Set the max speed.
    pub fn with_max_speed(mut self, max_speed: u32) -> Self {
        self.max_speed = max_speed;
        self
    }

    /// Set the capability flags.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

/// Direction of travel reported by the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Moving forward.
    Forward,
    /// Moving backward.
    Backward,
    /// Not moving.
    #[default]
    Idle,
}

impl Direction {
    /// Resolve the two wire flags. Backward wins when both are set.
    pub fn from_flags(is_forward: i32, is_backward: i32) -> Self {
        let mut direction = Direction::Idle;
        if is_forward != 0 {
            direction = Direction::Forward;
        }
        if is_backward != 0 {
            direction = Direction::Backward;
        }
        direction
    }

    /// Wire flags `(is_forward, is_backward)`.
    pub fn to_flags(self) -> (i32, i32) {
        match self {
            Direction::Forward => (1, 0),
            Direction::Backward => (0, 1),
            Direction::Idle => (0, 0),
        }
    }
}

/// Where the train is relative to the station.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Position {
    /// Unknown or between landmarks.
    #[default]
    Somewhere,
    /// Approaching the station.
    Approaching,
    /// Passing by without stopping.
    PassingBy,
    /// Braking to stop.
    Stopping,
    /// Stopped in the station.
    InStation,
    /// Leaving the station.
    Leaving,
}

impl Position {
    /// Map a wire code; anything unknown is `Somewhere`.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Position::Approaching,
            2 => Position::PassingBy,
            3 => Position::Stopping,
            4 => Position::InStation,
            5 => Position::Leaving,
            _ => Position::Somewhere,
        }
    }

    /// Wire code.
    pub fn code(self) -> i32 {
        match self {
            Position::Somewhere => 0,
            Position::Approaching => 1,
            Position::PassingBy => 2,
            Position::Stopping => 3,
            Position::InStation => 4,
            Position::Leaving => 5,
        }
    }
}

/// Live state of a track as last reported by its device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackState {
    /// Direction of travel.
    pub direction: Direction,
    /// Raw signed speed, in units of the definition's `max_speed`.
    pub speed: i32,
    /// Device-maintained counter.
    pub count: u32,
    /// Position relative to the station.
    pub position: Position,
}

// ============================================================================
// Track entity
// ============================================================================

/// Progress of the acquire/release handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LinkState {
    /// No authority and nothing requested.
    #[default]
    Unlinked,
    /// Acquire sent, waiting for the ack.
    LinkPending,
    /// Authority granted.
    Linked,
    /// Release sent, waiting for the ack.
    UnlinkPending,
}

/// One observable field that changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TrackChange {
    /// `direction` changed.
    Direction,
    /// `speed` changed.
    Speed,
    /// `count` changed.
    Count,
    /// `position` changed.
    Position,
    /// `linked` changed.
    Linked,
}

/// Field changes produced by one [`Track::set_state`] call.
pub type StateChanges = heapless::Vec<TrackChange, 4>;

/// A controllable track on a remote device.
#[derive(Debug)]
pub struct Track {
    definition: TrackDefinition,
    state: TrackState,
    link: LinkState,
    linked: bool,
    last_speed_request: Option<f32>,
    debounce: OneShotTimer,
}

impl Track {
    /// Create an unlinked track with a speed debounce window of `debounce_ms`.
    pub fn new(definition: TrackDefinition, debounce_ms: u64) -> Self {
        Self {
            definition,
            state: TrackState::default(),
            link: LinkState::Unlinked,
            linked: false,
            last_speed_request: None,
            debounce: OneShotTimer::new(debounce_ms),
        }
    }

    /// Device-local id.
    pub fn id(&self) -> u32 {
        self.definition.id
    }

    /// Label from the definition.
    pub fn label(&self) -> &str {
        &self.definition.label
    }

    /// Capability flags from the definition.
    pub fn capabilities(&self) -> Capabilities {
        self.definition.capabilities
    }

    /// The definition this track was created from.
    pub fn definition(&self) -> &TrackDefinition {
        &self.definition
    }

    /// Last reported state.
    pub fn state(&self) -> &TrackState {
        &self.state
    }

    /// Current direction.
    pub fn direction(&self) -> Direction {
        self.state.direction
    }

    /// Speed normalized against `max_speed`. Zero if `max_speed` is zero.
    pub fn speed(&self) -> f32 {
        if self.definition.max_speed == 0 {
            return 0.0;
        }
        self.state.speed as f32 / self.definition.max_speed as f32
    }

    /// Device counter.
    pub fn count(&self) -> u32 {
        self.state.count
    }

    /// Current position.
    pub fn position(&self) -> Position {
        self.state.position
    }

    /// Whether command authority is held.
    pub fn linked(&self) -> bool {
        self.linked
    }

    /// Handshake progress.
    pub fn link_state(&self) -> LinkState {
        self.link
    }

    /// Request command authority. Returns the frame to send.
    pub fn acquire(&mut self) -> Frame {
        self.link = LinkState::LinkPending;
        debug!(track_id = self.id(), "acquire requested");
        Frame::AcquireTrack {
            track_id: self.id(),
        }
    }

    /// Give command authority back. Returns the frame to send.
    pub fn release(&mut self) -> Frame {
        self.link = LinkState::UnlinkPending;
        debug!(track_id = self.id(), "release requested");
        Frame::ReleaseTrack {
            track_id: self.id(),
        }
    }

    /// Apply an acquire acknowledgement.
    ///
    /// Ignored unless an acquire is pending. Returns whether `linked` changed.
    pub fn on_acquire_ack(&mut self, granted: bool) -> bool {
        if self.link != LinkState::LinkPending {
            debug!(
                track_id = self.id(),
                link = ?self.link,
                "ignoring unsolicited acquire ack"
            );
            return false;
        }
        self.link = if granted {
            LinkState::Linked
        } else {
            LinkState::Unlinked
        };
        self.set_linked(granted)
    }

    /// Apply a release acknowledgement.
    ///
    /// Ignored unless a release is pending. Returns whether `linked` changed.
    pub fn on_release_ack(&mut self, granted: bool) -> bool {
        if self.link != LinkState::UnlinkPending {
            debug!(
                track_id = self.id(),
                link = ?self.link,
                "ignoring unsolicited release ack"
            );
            return false;
        }
        if granted {
            self.link = LinkState::Unlinked;
            self.set_linked(false)
        } else {
            self.link = if self.linked {
                LinkState::Linked
            } else {
                LinkState::Unlinked
            };
            false
        }
    }

    fn set_linked(&mut self, linked: bool) -> bool {
        if self.linked == linked {
            return false;
        }
        self.linked = linked;
        if !linked {
            self.last_speed_request = None;
            self.debounce.stop();
        }
        debug!(track_id = self.id(), linked, "link changed");
        true
    }

    /// Request a normalized speed in `[0, 1]` (clamped).
    ///
    /// Returns the command to send, or `None` when the track is not linked,
    /// the value is not finite, the value equals the last one sent, or the
    /// debounce window from the previous command is still open. Requests dropped during the window are
    /// not sent when it closes.
    pub fn request_speed(&mut self, speed: f32, now_ms: u64) -> Option<Frame> {
        if !self.linked {
            debug!(track_id = self.id(), "speed request ignored: not linked");
            return None;
        }
        if !speed.is_finite() {
            warn!(track_id = self.id(), speed, "speed request ignored: not finite");
            return None;
        }
        let speed = speed.clamp(0.0, 1.0);
        if self.last_speed_request == Some(speed) {
            return None;
        }
        if self.debounce.is_active(now_ms) {
            debug!(track_id = self.id(), speed, "speed request debounced");
            return None;
        }

        self.last_speed_request = Some(speed);
        self.debounce.start(now_ms);
        Some(Frame::SpeedCommand {
            track_id: self.id(),
            raw_speed: self.raw_speed(speed),
        })
    }

    fn raw_speed(&self, speed: f32) -> i32 {
        (f64::from(speed) * f64::from(self.definition.max_speed)).round() as i32
    }

    /// Replace the live state and report which fields changed.
    pub fn set_state(&mut self, state: TrackState) -> StateChanges {
        let old = core::mem::replace(&mut self.state, state);
        let mut changes = StateChanges::new();

        if old.direction != state.direction {
            debug!(track_id = self.id(), direction = ?state.direction, "direction changed");
            let _ = changes.push(TrackChange::Direction);
        }
        if old.speed != state.speed {
            debug!(track_id = self.id(), speed = state.speed, "speed changed");
            let _ = changes.push(TrackChange::Speed);
        }
        if old.count != state.count {
            debug!(track_id = self.id(), count = state.count, "count changed");
            let _ = changes.push(TrackChange::Count);
        }
        if old.position != state.position {
            debug!(track_id = self.id(), position = ?state.position, "position changed");
            let _ = changes.push(TrackChange::Position);
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linked_track(max_speed: u32) -> Track {
        let mut track = Track::new(TrackDefinition::new(7, "T").with_max_speed(max_speed), 100);
        track.acquire();
        track.on_acquire_ack(true);
        track
    }

    // =========================================================================
    // Wire value mapping
    // =========================================================================

    #[test]
    fn position_codes() {
        for code in [0, 6, -1, i32::MAX] {
            assert_eq!(Position::from_code(code), Position::Somewhere);
        }
        assert_eq!(Position::from_code(1), Position::Approaching);
        assert_eq!(Position::from_code(2), Position::PassingBy);
        assert_eq!(Position::from_code(3), Position::Stopping);
        assert_eq!(Position::from_code(4), Position::InStation);
        assert_eq!(Position::from_code(5), Position::Leaving);
    }

    #[test]
    fn direction_backward_wins() {
        assert_eq!(Direction::from_flags(1, 1), Direction::Backward);
        assert_eq!(Direction::from_flags(1, 0), Direction::Forward);
        assert_eq!(Direction::from_flags(0, -3), Direction::Backward);
        assert_eq!(Direction::from_flags(0, 0), Direction::Idle);
    }

    #[test]
    fn capabilities_drop_unknown_bits() {
        let caps = Capabilities::from_bits(0xFFFF);
        assert_eq!(caps, Capabilities::SPEED_CONTROL | Capabilities::POSITIONING);
        assert!(caps.contains(Capabilities::POSITIONING));
        assert!(Capabilities::from_bits(0).is_empty());
    }

    #[test]
    fn default_definition() {
        let def = TrackDefinition::new(3, "Yard");
        assert_eq!(def.max_speed, DEFAULT_MAX_SPEED);
        assert!(def.capabilities.is_empty());
    }

    // =========================================================================
    // Link handshake
    // =========================================================================

    #[test]
    fn acquire_granted_links() {
        let mut track = Track::new(TrackDefinition::new(1, "A"), 100);
        assert_eq!(track.acquire(), Frame::AcquireTrack { track_id: 1 });
        assert_eq!(track.link_state(), LinkState::LinkPending);
        assert!(!track.linked(), "no optimistic link");
        assert!(track.on_acquire_ack(true));
        assert!(track.linked());
        assert_eq!(track.link_state(), LinkState::Linked);
    }

    #[test]
    fn acquire_denied_stays_unlinked() {
        let mut track = Track::new(TrackDefinition::new(1, "A"), 100);
        track.acquire();
        assert!(!track.on_acquire_ack(false));
        assert!(!track.linked());
        assert_eq!(track.link_state(), LinkState::Unlinked);
    }

    #[test]
    fn unsolicited_acks_change_nothing() {
        let mut track = Track::new(TrackDefinition::new(1, "A"), 100);
        assert!(!track.on_acquire_ack(true));
        assert!(!track.on_release_ack(true));
        assert!(!track.linked());
        assert_eq!(track.link_state(), LinkState::Unlinked);

        let mut track = linked_track(4096);
        assert!(!track.on_acquire_ack(false));
        assert!(track.linked());
    }

    #[test]
    fn release_granted_unlinks() {
        let mut track = linked_track(4096);
        assert_eq!(track.release(), Frame::ReleaseTrack { track_id: 7 });
        assert!(track.linked(), "still linked until acked");
        assert!(track.on_release_ack(true));
        assert!(!track.linked());
        assert_eq!(track.link_state(), LinkState::Unlinked);
    }

    #[test]
    fn release_denied_remains_linked() {
        let mut track = linked_track(4096);
        track.release();
        assert!(!track.on_release_ack(false));
        assert!(track.linked());
        assert_eq!(track.link_state(), LinkState::Linked);
    }

    // =========================================================================
    // Speed requests
    // =========================================================================

    #[test]
    fn speed_ignored_when_unlinked() {
        let mut track = Track::new(TrackDefinition::new(1, "A"), 100);
        assert_eq!(track.request_speed(0.5, 0), None);
    }

    #[test]
    fn speed_scaled_and_rounded() {
        let mut track = linked_track(1000);
        assert_eq!(
            track.request_speed(0.3333, 0),
            Some(Frame::SpeedCommand {
                track_id: 7,
                raw_speed: 333
            })
        );
    }

    #[test]
    fn speed_debounce_is_leading_edge_only() {
        let mut track = linked_track(4096);
        assert!(track.request_speed(0.25, 0).is_some());
        assert_eq!(track.request_speed(0.75, 50), None);
        // Window closed: the dropped value is not flushed, a new call sends
        assert_eq!(
            track.request_speed(0.75, 100),
            Some(Frame::SpeedCommand {
                track_id: 7,
                raw_speed: 3072
            })
        );
    }

    #[test]
    fn speed_equal_to_last_issued_is_ignored() {
        let mut track = linked_track(4096);
        assert!(track.request_speed(0.5, 0).is_some());
        assert_eq!(track.request_speed(0.5, 500), None);
    }

    #[test]
    fn speed_clamped() {
        let mut track = linked_track(100);
        assert_eq!(
            track.request_speed(1.5, 0),
            Some(Frame::SpeedCommand {
                track_id: 7,
                raw_speed: 100
            })
        );
    }

    #[test]
    fn non_finite_speed_is_ignored() {
        let mut track = linked_track(100);
        assert_eq!(track.request_speed(f32::NAN, 0), None);
        assert_eq!(track.request_speed(f32::NAN, 500), None);
        assert_eq!(track.request_speed(f32::INFINITY, 1000), None);

        // Rejected values do not open the debounce window
        assert_eq!(
            track.request_speed(0.25, 1001),
            Some(Frame::SpeedCommand {
                track_id: 7,
                raw_speed: 25
            })
        );
    }

    #[test]
    fn unlink_resets_last_request() {
        let mut track = linked_track(100);
        assert!(track.request_speed(0.5, 0).is_some());
        track.release();
        track.on_release_ack(true);
        track.acquire();
        track.on_acquire_ack(true);
        assert!(track.request_speed(0.5, 10).is_some());
    }

    // =========================================================================
    // State updates
    // =========================================================================

    #[test]
    fn set_state_reports_each_field() {
        let mut track = Track::new(TrackDefinition::new(1, "A").with_max_speed(2048), 100);
        let changes = track.set_state(TrackState {
            direction: Direction::Forward,
            speed: 1024,
            count: 0,
            position: Position::PassingBy,
        });
        assert_eq!(
            changes.as_slice(),
            &[TrackChange::Direction, TrackChange::Speed, TrackChange::Position]
        );
        assert!((track.speed() - 0.5).abs() < f32::EPSILON);

        let same = *track.state();
        assert!(track.set_state(same).is_empty());
    }

    #[test]
    fn zero_max_speed_normalizes_to_zero() {
        let mut track = Track::new(TrackDefinition::new(1, "A").with_max_speed(0), 100);
        track.set_state(TrackState {
            speed: 10,
            ..TrackState::default()
        });
        assert_eq!(track.speed(), 0.0);
    }
}
