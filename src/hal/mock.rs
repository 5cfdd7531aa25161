//! Mock implementations for testing without a radio or serial link.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockTransport`] | [`Transport`] | Records writes and connect/disconnect requests |
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//!
//! # Example
//!
//! ```rust
//! use train_station::{ConnectionManager, Frame, StationConfig};
//! use train_station::hal::MockTransport;
//!
//! let mut manager = ConnectionManager::new(MockTransport::new(), StationConfig::default());
//! manager.on_connected("AA:BB".into(), "ESP train");
//! manager.on_bytes_received(&"AA:BB".into(), &Frame::Ping { count: 1 }.encode(), 0);
//!
//! // The ping was echoed back
//! let sent = manager.transport().sent_frames_to(&"AA:BB".into());
//! assert_eq!(sent, vec![Frame::Ping { count: 1 }]);
//! ```
//!
//! [`Transport`]: crate::traits::Transport
//! [`Clock`]: crate::traits::Clock

use crate::address::DeviceAddress;
use crate::frame::{Frame, FrameType};
use crate::traits::{Clock, Transport};

// ============================================================================
// Transport Mock
// ============================================================================

/// Mock transport for testing.
///
/// Every accepted byte is appended to `written` in write order. Writes can be
/// capped to simulate short writes, and connect/disconnect/write can each be
/// made to fail.
///
/// # Example
///
/// ```rust
/// use train_station::hal::MockTransport;
/// use train_station::traits::Transport;
///
/// let mut transport = MockTransport::new().with_max_write(2);
/// let addr = "AA".into();
///
/// assert_eq!(transport.write(&addr, &[1, 2, 3]).unwrap(), 2);
/// assert_eq!(transport.written_bytes(), vec![1, 2]);
///
/// transport.connect(&addr).unwrap();
/// assert_eq!(transport.connects, vec![addr]);
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    /// Accepted bytes per write call, in call order.
    pub written: Vec<(DeviceAddress, Vec<u8>)>,
    /// Addresses passed to `connect`, in call order.
    pub connects: Vec<DeviceAddress>,
    /// Addresses passed to `disconnect`, in call order.
    pub disconnects: Vec<DeviceAddress>,
    /// Number of `write` calls, including failed ones.
    pub write_calls: usize,
    /// Cap on bytes accepted per write (`None` = unlimited).
    pub max_write: Option<usize>,
    /// Make every write fail.
    pub fail_writes: bool,
    /// Make every connect request fail.
    pub fail_connects: bool,
}

impl MockTransport {
    /// Creates a transport that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept at most `max` bytes per write call.
    pub fn with_max_write(mut self, max: usize) -> Self {
        self.max_write = Some(max);
        self
    }

    /// Every byte written, all addresses, in order.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.written
            .iter()
            .flat_map(|(_, chunk)| chunk.iter().copied())
            .collect()
    }

    /// Byte stream written to one address.
    pub fn written_to(&self, address: &DeviceAddress) -> Vec<u8> {
        self.written
            .iter()
            .filter(|(a, _)| a == address)
            .flat_map(|(_, chunk)| chunk.iter().copied())
            .collect()
    }

    /// Frames written to one address, decoded as a device would.
    pub fn sent_frames_to(&self, address: &DeviceAddress) -> Vec<Frame> {
        split_commands(&self.written_to(address))
    }

    /// Frames written to any address, decoded as a device would.
    pub fn sent_frames(&self) -> Vec<Frame> {
        split_commands(&self.written_bytes())
    }

    /// Forget everything recorded so far.
    pub fn clear(&mut self) {
        self.written.clear();
        self.connects.clear();
        self.disconnects.clear();
        self.write_calls = 0;
    }
}

impl Transport for MockTransport {
    type Error = &'static str;

    fn connect(&mut self, address: &DeviceAddress) -> Result<(), Self::Error> {
        self.connects.push(address.clone());
        if self.fail_connects {
            return Err("connect refused");
        }
        Ok(())
    }

    fn disconnect(&mut self, address: &DeviceAddress) -> Result<(), Self::Error> {
        self.disconnects.push(address.clone());
        Ok(())
    }

    fn write(&mut self, address: &DeviceAddress, bytes: &[u8]) -> Result<usize, Self::Error> {
        self.write_calls += 1;
        if self.fail_writes {
            return Err("link down");
        }
        let n = self.max_write.map_or(bytes.len(), |max| bytes.len().min(max));
        if n > 0 {
            self.written.push((address.clone(), bytes[..n].to_vec()));
        }
        Ok(n)
    }
}

/// Split a controller-to-device byte stream into frames.
///
/// The protocol has no length prefix, so this relies on the fixed sizes of
/// the frames a controller sends. Stops at the first unknown tag.
fn split_commands(mut stream: &[u8]) -> Vec<Frame> {
    let mut frames = Vec::new();
    while stream.len() >= 4 {
        let tag = u32::from_be_bytes([stream[0], stream[1], stream[2], stream[3]]);
        let len = match FrameType::from_tag(tag) {
            Some(FrameType::Ping) | Some(FrameType::SpeedCommand) => 12,
            Some(FrameType::AcquireTrack) | Some(FrameType::ReleaseTrack) => 8,
            _ => break,
        };
        if stream.len() < len {
            break;
        }
        match Frame::decode_command(&stream[..len]) {
            Ok(frame) => frames.push(frame),
            Err(_) => break,
        }
        stream = &stream[len..];
    }
    frames
}

// ============================================================================
// Clock Mock
// ============================================================================

/// Mock clock for testing.
///
/// # Example
///
/// ```rust
/// use train_station::hal::MockClock;
/// use train_station::traits::Clock;
///
/// let mut clock = MockClock::new();
/// clock.set(1000);
/// clock.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Debug, Default)]
pub struct MockClock {
    current_ms: u64,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current time in milliseconds.
    pub fn set(&mut self, ms: u64) {
        self.current_ms = ms;
    }

    /// Advances the clock by the given duration.
    pub fn advance(&mut self, ms: u64) {
        self.current_ms += ms;
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_commands_reads_back_to_back_frames() {
        let mut stream = Frame::AcquireTrack { track_id: 1 }.encode().to_vec();
        stream.extend_from_slice(&Frame::SpeedCommand { track_id: 1, raw_speed: 10 }.encode());
        stream.extend_from_slice(&Frame::Ping { count: 4 }.encode());
        assert_eq!(
            split_commands(&stream),
            vec![
                Frame::AcquireTrack { track_id: 1 },
                Frame::SpeedCommand { track_id: 1, raw_speed: 10 },
                Frame::Ping { count: 4 },
            ]
        );
    }

    #[test]
    fn written_to_filters_by_address() {
        let mut transport = MockTransport::new();
        transport.write(&"A".into(), &[1]).unwrap();
        transport.write(&"B".into(), &[2]).unwrap();
        transport.write(&"A".into(), &[3]).unwrap();
        assert_eq!(transport.written_to(&"A".into()), vec![1, 3]);
    }

    #[test]
    fn failures_are_recorded() {
        let mut transport = MockTransport::new();
        transport.fail_connects = true;
        transport.fail_writes = true;
        assert!(transport.connect(&"A".into()).is_err());
        assert!(transport.write(&"A".into(), &[1]).is_err());
        assert_eq!(transport.connects.len(), 1);
        assert_eq!(transport.write_calls, 1);
        assert!(transport.written.is_empty());
    }
}
