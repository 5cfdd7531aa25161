//! Error types for decoding, sending and the command surface.
//!
//! None of these ever escape the inbound path: decode failures degrade to
//! [`Frame::Unsupported`](crate::Frame::Unsupported) and write failures are
//! logged. They are returned to callers of the presentation-facing commands
//! and of [`Frame::try_decode`](crate::Frame::try_decode).

use thiserror::Error;

use crate::address::{DeviceAddress, TrackKey};
use crate::frame::FrameType;

/// Why a buffer could not be decoded into a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Type tag outside the protocol table.
    #[error("unknown frame type tag {0:#010x}")]
    UnknownType(u32),

    /// Type tag of a frame only the controller sends.
    #[error("frame type {0:?} is outbound only")]
    OutboundOnly(FrameType),

    /// Inbound-only frame handed to the command decoder.
    #[error("frame type {0:?} is not a device command")]
    NotACommand(FrameType),

    /// Buffer ended before the layout was complete.
    #[error("truncated frame reading {field}: needed {needed} bytes, {remaining} left")]
    Truncated {
        /// Field being read.
        field: &'static str,
        /// Bytes the field needs.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },
}

/// An outbound frame could not be fully written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The transport reported a write failure.
    #[error("write to {address} failed: {reason}")]
    Write {
        /// Destination device.
        address: DeviceAddress,
        /// Transport error text.
        reason: String,
    },

    /// The transport accepted zero bytes of a pending buffer.
    #[error("write to {address} stalled after {written} of {total} bytes")]
    Stalled {
        /// Destination device.
        address: DeviceAddress,
        /// Bytes flushed before the stall.
        written: usize,
        /// Size of the frame.
        total: usize,
    },
}

/// Errors returned by the presentation-facing command surface.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StationError {
    /// No session for this address.
    #[error("unknown device {0}")]
    UnknownDevice(DeviceAddress),

    /// The device has no track with this id.
    #[error("unknown track {0}")]
    UnknownTrack(TrackKey),

    /// The command frame could not be written.
    #[error(transparent)]
    Send(#[from] SendError),
}

/// Result alias for command operations.
pub type StationResult<T> = Result<T, StationError>;
