//! Device addresses and structured track keys.
//!
//! A track is identified by the pair of the device it lives on and its
//! device-local id. [`TrackKey`] holds that pair as two typed fields so that
//! no delimiter inside an address can make two keys collide.

use core::fmt;

/// Transport-level address of a remote unit (e.g. a Bluetooth MAC).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DeviceAddress(String);

// ---- impl DeviceAddress ----

impl DeviceAddress {
    /// Create an address from any string-like value.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The address as text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceAddress {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl From<String> for DeviceAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Registry key of one track: `(device address, track id)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackKey {
    /// Device owning the track.
    pub address: DeviceAddress,
    /// Track id, local to the device.
    pub track_id: u32,
}

impl TrackKey {
    /// Build a key from its parts.
    pub fn new(address: impl Into<DeviceAddress>, track_id: u32) -> Self {
        Self {
            address: address.into(),
            track_id,
        }
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.address, self.track_id)
    }
}
