//! Per-device session: inbound frame dispatch and outbound writes.
//!
//! A [`DeviceSession`] exists from the transport's "connected" event until
//! the device disconnects. It owns the device's tracks, answers pings, and
//! is the only place frames are written to the transport. Dropping the
//! session drops all of its tracks at once.

use std::collections::BTreeMap;

use tracing::{debug, info, trace, warn};

use crate::address::{DeviceAddress, TrackKey};
use crate::error::{SendError, StationError, StationResult};
use crate::events::{EventQueue, StationEvent};
use crate::frame::Frame;
use crate::track::{Track, TrackChange};
use crate::traits::Transport;

/// One connected remote unit and its tracks.
#[derive(Debug)]
pub struct DeviceSession {
    address: DeviceAddress,
    display_name: String,
    tracks: BTreeMap<u32, Track>,
    alive: bool,
    debounce_ms: u64,
}

impl DeviceSession {
    /// New session with no tracks. It is not alive until its first ping.
    pub fn new(address: DeviceAddress, display_name: impl Into<String>, debounce_ms: u64) -> Self {
        Self {
            address,
            display_name: display_name.into(),
            tracks: BTreeMap::new(),
            alive: false,
            debounce_ms,
        }
    }

    /// Transport address.
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Name published in the device list.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Whether a ping was seen during the current liveness epoch.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Start a new liveness epoch.
    pub fn clear_alive(&mut self) {
        self.alive = false;
    }

    /// Track by id.
    pub fn track(&self, track_id: u32) -> Option<&Track> {
        self.tracks.get(&track_id)
    }

    /// Tracks in id order.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    /// Number of tracks.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    fn key(&self, track_id: u32) -> TrackKey {
        TrackKey::new(self.address.clone(), track_id)
    }

    // ------------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------------

    /// Decode one received buffer and act on it.
    pub fn on_frame_received<T: Transport>(
        &mut self,
        bytes: &[u8],
        transport: &mut T,
        events: &mut EventQueue,
    ) {
        let frame = Frame::decode(bytes);
        trace!(address = %self.address, frame_type = ?frame.frame_type(), "frame received");

        match frame {
            Frame::Ping { count } => {
                let _ = self.send(&Frame::Ping { count }, transport);
                self.alive = true;
            }
            Frame::Capabilities { definitions } => {
                for definition in definitions {
                    if let Some(existing) = self.tracks.get(&definition.id) {
                        warn!(
                            address = %self.address,
                            track_id = definition.id,
                            existing = existing.label(),
                            rejected = %definition.label,
                            "unable to redefine track"
                        );
                        continue;
                    }
                    info!(
                        address = %self.address,
                        track_id = definition.id,
                        label = %definition.label,
                        "inserting a new track"
                    );
                    self.tracks
                        .insert(definition.id, Track::new(definition, self.debounce_ms));
                }
                events.push(StationEvent::TracksChanged);
            }
            Frame::TrackState { track_id, state } => {
                let Some(track) = self.tracks.get_mut(&track_id) else {
                    warn!(address = %self.address, track_id, "state for unknown track");
                    return;
                };
                let changes = track.set_state(state);
                events.push_track_changes(&self.key(track_id), &changes);
            }
            Frame::AcquireAck { track_id, granted } => {
                let Some(track) = self.tracks.get_mut(&track_id) else {
                    warn!(address = %self.address, track_id, "acquire ack for unknown track");
                    return;
                };
                if track.on_acquire_ack(granted) {
                    events.push_track_changes(&self.key(track_id), &[TrackChange::Linked]);
                }
            }
            Frame::ReleaseAck { track_id, granted } => {
                let Some(track) = self.tracks.get_mut(&track_id) else {
                    warn!(address = %self.address, track_id, "release ack for unknown track");
                    return;
                };
                if track.on_release_ack(granted) {
                    events.push_track_changes(&self.key(track_id), &[TrackChange::Linked]);
                }
            }
            // Decode never yields outbound-only frames
            Frame::Unsupported
            | Frame::AcquireTrack { .. }
            | Frame::ReleaseTrack { .. }
            | Frame::SpeedCommand { .. } => {}
        }
    }

    // ------------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------------

    /// Ask for command authority over a track.
    pub fn acquire<T: Transport>(&mut self, track_id: u32, transport: &mut T) -> StationResult<()> {
        let frame = self.track_mut(track_id)?.acquire();
        self.send(&frame, transport)?;
        Ok(())
    }

    /// Give command authority over a track back.
    pub fn release<T: Transport>(&mut self, track_id: u32, transport: &mut T) -> StationResult<()> {
        let frame = self.track_mut(track_id)?.release();
        self.send(&frame, transport)?;
        Ok(())
    }

    /// Request a normalized speed. Returns whether a command was sent.
    pub fn request_speed<T: Transport>(
        &mut self,
        track_id: u32,
        speed: f32,
        now_ms: u64,
        transport: &mut T,
    ) -> StationResult<bool> {
        match self.track_mut(track_id)?.request_speed(speed, now_ms) {
            Some(frame) => {
                self.send(&frame, transport)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn track_mut(&mut self, track_id: u32) -> StationResult<&mut Track> {
        match self.tracks.get_mut(&track_id) {
            Some(track) => Ok(track),
            None => Err(StationError::UnknownTrack(TrackKey::new(
                self.address.clone(),
                track_id,
            ))),
        }
    }

    /// Encode and write a frame, looping over short writes.
    ///
    /// A transport error or a zero-length write abandons the frame. Either is
    /// logged and returned; neither disconnects the device.
    pub fn send<T: Transport>(&self, frame: &Frame, transport: &mut T) -> Result<(), SendError> {
        let bytes = frame.encode();
        let total = bytes.len();
        let mut written = 0;

        while written < total {
            match transport.write(&self.address, &bytes[written..]) {
                Ok(0) => {
                    let err = SendError::Stalled {
                        address: self.address.clone(),
                        written,
                        total,
                    };
                    warn!(error = %err, "abandoning send");
                    return Err(err);
                }
                Ok(n) => written += n.min(total - written),
                Err(e) => {
                    let err = SendError::Write {
                        address: self.address.clone(),
                        reason: e.to_string(),
                    };
                    warn!(error = %err, frame_type = ?frame.frame_type(), "abandoning send");
                    return Err(err);
                }
            }
        }
        debug!(address = %self.address, frame_type = ?frame.frame_type(), len = total, "frame sent");
        Ok(())
    }
}
