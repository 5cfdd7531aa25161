//! Binary frame protocol spoken with remote track units.
//!
//! Every frame starts with a 32-bit type tag. All integers are big-endian.
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! |        type tag (u32 BE)          |  layout   |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! | Tag | Frame | Direction | Layout after the tag |
//! |-----|-------|-----------|----------------------|
//! | 0 | `Unsupported` | synthetic | - |
//! | 1 | `Ping` | both | `count:u64` |
//! | 2 | `Capabilities` | device → controller | `n:u32`, then `n` × definition |
//! | 3 | `TrackState` | device → controller | `id:u32 fwd:i32 bwd:i32 speed:i32 count:u32 pos:i32` |
//! | 4 | `AcquireTrack` | controller → device | `id:u32` |
//! | 5 | `AcquireAck` | device → controller | `id:u32 ack:u32` |
//! | 6 | `ReleaseTrack` | controller → device | `id:u32` |
//! | 7 | `ReleaseAck` | device → controller | `id:u32 ack:u32` |
//! | 8 | `SpeedCommand` | controller → device | `id:u32 speed:i32` |
//!
//! A definition is `id:u32 len:u32 label[len+1] max_speed:u32 caps:u16`,
//! where the label bytes end with a NUL terminator.
//!
//! A transport read is assumed to carry exactly one frame; there is no
//! length prefix to reassemble split or coalesced reads.
//!
//! # Example
//!
//! ```rust
//! use train_station::Frame;
//!
//! let bytes = Frame::Ping { count: 42 }.encode();
//! assert_eq!(&bytes[..4], &[0, 0, 0, 1]);
//! assert_eq!(Frame::decode(&bytes), Frame::Ping { count: 42 });
//!
//! // Garbage never errors, it degrades
//! assert_eq!(Frame::decode(&[0, 0, 0, 0x63]), Frame::Unsupported);
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{trace, warn};

use crate::error::DecodeError;
use crate::track::{Capabilities, Direction, Position, TrackDefinition, TrackState};

// ---------------------------------------------------------------------------
// Frame types
// ---------------------------------------------------------------------------

/// Wire type tags, in protocol order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum FrameType {
    /// Synthetic; never sent.
    Unsupported = 0,
    /// Keepalive.
    Ping = 1,
    /// Track definitions.
    Capabilities = 2,
    /// Live track state.
    TrackState = 3,
    /// Request command authority (outbound only).
    AcquireTrack = 4,
    /// Answer to `AcquireTrack`.
    AcquireAck = 5,
    /// Give authority back (outbound only).
    ReleaseTrack = 6,
    /// Answer to `ReleaseTrack`.
    ReleaseAck = 7,
    /// Speed command (outbound only).
    SpeedCommand = 8,
}

impl FrameType {
    /// Look up a wire tag.
    pub fn from_tag(tag: u32) -> Option<Self> {
        Some(match tag {
            0 => FrameType::Unsupported,
            1 => FrameType::Ping,
            2 => FrameType::Capabilities,
            3 => FrameType::TrackState,
            4 => FrameType::AcquireTrack,
            5 => FrameType::AcquireAck,
            6 => FrameType::ReleaseTrack,
            7 => FrameType::ReleaseAck,
            8 => FrameType::SpeedCommand,
            _ => return None,
        })
    }

    /// The wire tag.
    #[inline]
    pub const fn tag(self) -> u32 {
        self as u32
    }

    /// Whether only the controller ever sends this type.
    pub const fn is_outbound_only(self) -> bool {
        matches!(
            self,
            FrameType::AcquireTrack | FrameType::ReleaseTrack | FrameType::SpeedCommand
        )
    }
}

/// One protocol message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// Anything that could not be decoded.
    Unsupported,
    /// Keepalive; the controller echoes the count back.
    Ping {
        /// Sequence count chosen by the device.
        count: u64,
    },
    /// Track definitions announced by a device.
    Capabilities {
        /// Definitions in wire order.
        definitions: Vec<TrackDefinition>,
    },
    /// Live state of one track.
    TrackState {
        /// Track id.
        track_id: u32,
        /// Reported state.
        state: TrackState,
    },
    /// Result of an acquire request.
    AcquireAck {
        /// Track id.
        track_id: u32,
        /// Whether authority was granted.
        granted: bool,
    },
    /// Result of a release request.
    ReleaseAck {
        /// Track id.
        track_id: u32,
        /// Whether the release was accepted.
        granted: bool,
    },
    /// Request authority over a track.
    AcquireTrack {
        /// Track id.
        track_id: u32,
    },
    /// Give authority over a track back.
    ReleaseTrack {
        /// Track id.
        track_id: u32,
    },
    /// Set a track's speed.
    SpeedCommand {
        /// Track id.
        track_id: u32,
        /// Speed in units of the track's `max_speed`.
        raw_speed: i32,
    },
}

impl Frame {
    /// Type tag of this frame.
    pub fn frame_type(&self) -> FrameType {
        match self {
            Frame::Unsupported => FrameType::Unsupported,
            Frame::Ping { .. } => FrameType::Ping,
            Frame::Capabilities { .. } => FrameType::Capabilities,
            Frame::TrackState { .. } => FrameType::TrackState,
            Frame::AcquireAck { .. } => FrameType::AcquireAck,
            Frame::ReleaseAck { .. } => FrameType::ReleaseAck,
            Frame::AcquireTrack { .. } => FrameType::AcquireTrack,
            Frame::ReleaseTrack { .. } => FrameType::ReleaseTrack,
            Frame::SpeedCommand { .. } => FrameType::SpeedCommand,
        }
    }

    /// Decode one inbound frame, degrading any failure to [`Frame::Unsupported`].
    pub fn decode(bytes: &[u8]) -> Frame {
        match Self::try_decode(bytes) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, len = bytes.len(), "dropping malformed frame");
                Frame::Unsupported
            }
        }
    }

    /// Decode one inbound frame, reporting why it failed.
    ///
    /// Outbound-only tags are rejected: a controller never receives them.
    pub fn try_decode(bytes: &[u8]) -> Result<Frame, DecodeError> {
        let mut reader = Reader::new(bytes);
        let tag = reader.u32("type")?;
        let frame_type = FrameType::from_tag(tag).ok_or(DecodeError::UnknownType(tag))?;

        let frame = match frame_type {
            FrameType::Unsupported => Frame::Unsupported,
            FrameType::Ping => Frame::Ping {
                count: reader.u64("count")?,
            },
            FrameType::Capabilities => Frame::Capabilities {
                definitions: read_definitions(&mut reader)?,
            },
            FrameType::TrackState => Frame::TrackState {
                track_id: reader.u32("track id")?,
                state: read_state(&mut reader)?,
            },
            FrameType::AcquireAck => Frame::AcquireAck {
                track_id: reader.u32("track id")?,
                granted: reader.u32("ack")? != 0,
            },
            FrameType::ReleaseAck => Frame::ReleaseAck {
                track_id: reader.u32("track id")?,
                granted: reader.u32("ack")? != 0,
            },
            other => return Err(DecodeError::OutboundOnly(other)),
        };
        reader.finish(frame_type);
        Ok(frame)
    }

    /// Decode a frame the controller sends, as a device would.
    ///
    /// Accepts `Ping` and the outbound-only commands. Used by simulated
    /// devices and test doubles.
    pub fn decode_command(bytes: &[u8]) -> Result<Frame, DecodeError> {
        let mut reader = Reader::new(bytes);
        let tag = reader.u32("type")?;
        let frame_type = FrameType::from_tag(tag).ok_or(DecodeError::UnknownType(tag))?;

        let frame = match frame_type {
            FrameType::Ping => Frame::Ping {
                count: reader.u64("count")?,
            },
            FrameType::AcquireTrack => Frame::AcquireTrack {
                track_id: reader.u32("track id")?,
            },
            FrameType::ReleaseTrack => Frame::ReleaseTrack {
                track_id: reader.u32("track id")?,
            },
            FrameType::SpeedCommand => Frame::SpeedCommand {
                track_id: reader.u32("track id")?,
                raw_speed: reader.i32("speed")?,
            },
            other => return Err(DecodeError::NotACommand(other)),
        };
        reader.finish(frame_type);
        Ok(frame)
    }

    /// Encode to wire bytes.
    ///
    /// Total over all variants; `Unsupported` encodes to its bare tag.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u32(self.frame_type().tag());

        match self {
            Frame::Unsupported => {}
            Frame::Ping { count } => buf.put_u64(*count),
            Frame::Capabilities { definitions } => {
                buf.put_u32(definitions.len() as u32);
                for def in definitions {
                    write_definition(&mut buf, def);
                }
            }
            Frame::TrackState { track_id, state } => {
                buf.put_u32(*track_id);
                let (is_forward, is_backward) = state.direction.to_flags();
                buf.put_i32(is_forward);
                buf.put_i32(is_backward);
                buf.put_i32(state.speed);
                buf.put_u32(state.count);
                buf.put_i32(state.position.code());
            }
            Frame::AcquireAck { track_id, granted } | Frame::ReleaseAck { track_id, granted } => {
                buf.put_u32(*track_id);
                buf.put_u32(u32::from(*granted));
            }
            Frame::AcquireTrack { track_id } | Frame::ReleaseTrack { track_id } => {
                buf.put_u32(*track_id);
            }
            Frame::SpeedCommand {
                track_id,
                raw_speed,
            } => {
                buf.put_u32(*track_id);
                buf.put_i32(*raw_speed);
            }
        }
        buf.freeze()
    }

    fn encoded_len(&self) -> usize {
        4 + match self {
            Frame::Unsupported => 0,
            Frame::Ping { .. } => 8,
            Frame::Capabilities { definitions } => {
                4 + definitions
                    .iter()
                    .map(|d| DEFINITION_FIXED_LEN + d.label.len())
                    .sum::<usize>()
            }
            Frame::TrackState { .. } => 24,
            Frame::AcquireAck { .. } | Frame::ReleaseAck { .. } => 8,
            Frame::AcquireTrack { .. } | Frame::ReleaseTrack { .. } => 4,
            Frame::SpeedCommand { .. } => 8,
        }
    }
}

// ---------------------------------------------------------------------------
// Layout helpers
// ---------------------------------------------------------------------------

/// id + label length + terminator + max speed + capability bits.
const DEFINITION_FIXED_LEN: usize = 4 + 4 + 1 + 4 + 2;

fn read_definitions(reader: &mut Reader<'_>) -> Result<Vec<TrackDefinition>, DecodeError> {
    let count = reader.u32("track count")? as usize;
    // The count is untrusted; bound the allocation by what the buffer can hold.
    let mut definitions = Vec::with_capacity(count.min(reader.remaining() / DEFINITION_FIXED_LEN));
    for _ in 0..count {
        definitions.push(read_definition(reader)?);
    }
    Ok(definitions)
}

fn read_definition(reader: &mut Reader<'_>) -> Result<TrackDefinition, DecodeError> {
    let id = reader.u32("definition id")?;
    let label_len = reader.u32("label length")? as usize;
    let raw = reader.bytes("label", label_len.saturating_add(1))?;
    let text = raw.split(|&b| b == 0).next().unwrap_or_default();
    let label = String::from_utf8_lossy(text).into_owned();
    let max_speed = reader.u32("max speed")?;
    let capabilities = Capabilities::from_bits(reader.u16("capabilities")?);

    Ok(TrackDefinition {
        id,
        label,
        max_speed,
        capabilities,
    })
}

fn write_definition(buf: &mut BytesMut, def: &TrackDefinition) {
    buf.put_u32(def.id);
    buf.put_u32(def.label.len() as u32);
    buf.put_slice(def.label.as_bytes());
    buf.put_u8(0);
    buf.put_u32(def.max_speed);
    buf.put_u16(def.capabilities.bits());
}

fn read_state(reader: &mut Reader<'_>) -> Result<TrackState, DecodeError> {
    let is_forward = reader.i32("forward flag")?;
    let is_backward = reader.i32("backward flag")?;
    let speed = reader.i32("speed")?;
    let count = reader.u32("count")?;
    let position = reader.i32("position")?;

    Ok(TrackState {
        direction: Direction::from_flags(is_forward, is_backward),
        speed,
        count,
        position: Position::from_code(position),
    })
}

/// Bounds-checked big-endian reader over one frame.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, field: &'static str, needed: usize) -> Result<(), DecodeError> {
        if self.buf.remaining() < needed {
            return Err(DecodeError::Truncated {
                field,
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn u16(&mut self, field: &'static str) -> Result<u16, DecodeError> {
        self.need(field, 2)?;
        Ok(self.buf.get_u16())
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        self.need(field, 4)?;
        Ok(self.buf.get_u32())
    }

    fn i32(&mut self, field: &'static str) -> Result<i32, DecodeError> {
        self.need(field, 4)?;
        Ok(self.buf.get_i32())
    }

    fn u64(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        self.need(field, 8)?;
        Ok(self.buf.get_u64())
    }

    fn bytes(&mut self, field: &'static str, len: usize) -> Result<&'a [u8], DecodeError> {
        self.need(field, len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn finish(self, frame_type: FrameType) {
        if !self.buf.is_empty() {
            trace!(?frame_type, trailing = self.buf.len(), "ignoring trailing bytes");
        }
    }
}
