//! Transport collaborator interface.
//!
//! The transport owns discovery, pairing and channel negotiation. This crate
//! only needs it to open and close a byte stream per device address and to
//! write bytes. Inbound notifications (connected, disconnected, bytes
//! received) flow the other way, as calls on
//! [`ConnectionManager`](crate::ConnectionManager), and must be marshalled
//! onto the manager's execution context before they are delivered.
//!
//! # Example Implementation
//!
//! ```rust,ignore
//! use train_station::traits::Transport;
//! use train_station::DeviceAddress;
//!
//! struct SerialPorts { /* one socket per address */ }
//!
//! impl Transport for SerialPorts {
//!     type Error = std::io::Error;
//!
//!     fn connect(&mut self, address: &DeviceAddress) -> Result<(), Self::Error> {
//!         // Ask the stack to open the serial profile...
//!         Ok(())
//!     }
//!
//!     fn disconnect(&mut self, address: &DeviceAddress) -> Result<(), Self::Error> {
//!         Ok(())
//!     }
//!
//!     fn write(&mut self, address: &DeviceAddress, bytes: &[u8]) -> Result<usize, Self::Error> {
//!         // Non-blocking write, may be short
//!         Ok(bytes.len())
//!     }
//! }
//! ```

use core::fmt;

use crate::address::DeviceAddress;

/// Byte-stream-per-device transport.
///
/// None of these calls may block. `connect` and `disconnect` only issue the
/// request; the outcome is reported later through the manager's
/// `on_connected` / `on_disconnected`.
pub trait Transport {
    /// Error type for transport operations.
    type Error: fmt::Display;

    /// Ask the transport to open a stream to `address`.
    fn connect(&mut self, address: &DeviceAddress) -> Result<(), Self::Error>;

    /// Ask the transport to close the stream to `address`.
    fn disconnect(&mut self, address: &DeviceAddress) -> Result<(), Self::Error>;

    /// Write as much of `bytes` as possible without blocking.
    ///
    /// Returns the number of bytes accepted, which may be less than
    /// `bytes.len()`.
    fn write(&mut self, address: &DeviceAddress, bytes: &[u8]) -> Result<usize, Self::Error>;
}

/// A device reported by the discovery layer.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceInfo {
    /// Transport address.
    pub address: DeviceAddress,
    /// Advertised name.
    pub name: String,
    /// Whether the device advertises the serial-port profile.
    pub serial_profile: bool,
}

impl DeviceInfo {
    /// Describe a discovered device.
    pub fn new(address: impl Into<DeviceAddress>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            serial_profile: false,
        }
    }

    /// Mark the device as advertising the serial-port profile.
    pub fn with_serial_profile(mut self, serial_profile: bool) -> Self {
        self.serial_profile = serial_profile;
        self
    }
}
