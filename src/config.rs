//! Station configuration.
//!
//! Uses `heapless::String` for short names, matching the builder style of
//! the rest of the crate: start from `Default` and override with `with_*`.
//!
//! # Example
//!
//! ```rust
//! use train_station::config::{DiscoveryConfig, StationConfig};
//!
//! // Use defaults
//! let config = StationConfig::default();
//! assert_eq!(config.sweep_interval_ms, 3000);
//!
//! // Or customize
//! let config = StationConfig::default()
//!     .with_sweep_interval_ms(5000)
//!     .with_discovery(DiscoveryConfig::default().with_device_name("Layout A"));
//! ```

use heapless::String as HString;

use crate::traits::DeviceInfo;

/// Maximum length for short config strings (device names)
pub const MAX_SHORT_STRING: usize = 64;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Create a ShortString from a &str, truncating on a char boundary if too long
pub fn short_string(s: &str) -> ShortString {
    let mut end = s.len().min(MAX_SHORT_STRING);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut hs = ShortString::new();
    let _ = hs.push_str(&s[..end]);
    hs
}

// ============================================================================
// Station Config
// ============================================================================

/// Controller core configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StationConfig {
    /// Liveness sweep period in milliseconds
    pub sweep_interval_ms: u64,
    /// Speed command debounce window in milliseconds
    pub debounce_ms: u64,
    /// Tick cadence of the async driver in milliseconds
    pub poll_interval_ms: u64,
    /// Auto-connect policy for discovered devices
    pub discovery: DiscoveryConfig,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 3000,
            debounce_ms: 100,
            poll_interval_ms: 50,
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl StationConfig {
    /// Set the liveness sweep period
    pub fn with_sweep_interval_ms(mut self, ms: u64) -> Self {
        self.sweep_interval_ms = ms;
        self
    }

    /// Set the speed debounce window
    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Set the driver tick cadence
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms.max(1);
        self
    }

    /// Set the discovery policy
    pub fn with_discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.discovery = discovery;
        self
    }
}

// ============================================================================
// Discovery Config
// ============================================================================

/// Which discovered devices get connected automatically
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscoveryConfig {
    /// Whether discovery events trigger a connect at all
    pub auto_connect: bool,
    /// Device name accepted even without the serial profile
    pub device_name: ShortString,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            auto_connect: true,
            device_name: short_string("ESP train"),
        }
    }
}

impl DiscoveryConfig {
    /// Enable or disable auto-connect
    pub fn with_auto_connect(mut self, enabled: bool) -> Self {
        self.auto_connect = enabled;
        self
    }

    /// Set the accepted device name
    pub fn with_device_name(mut self, name: &str) -> Self {
        self.device_name = short_string(name);
        self
    }

    /// Whether a discovered device should be connected
    pub fn accepts(&self, info: &DeviceInfo) -> bool {
        self.auto_connect && (info.serial_profile || info.name == self.device_name.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StationConfig::default();
        assert_eq!(config.sweep_interval_ms, 3000);
        assert_eq!(config.debounce_ms, 100);
        assert_eq!(config.poll_interval_ms, 50);
        assert!(config.discovery.auto_connect);
        assert_eq!(config.discovery.device_name.as_str(), "ESP train");
    }

    #[test]
    fn builder_pattern() {
        let config = StationConfig::default()
            .with_sweep_interval_ms(1000)
            .with_debounce_ms(250)
            .with_poll_interval_ms(0)
            .with_discovery(DiscoveryConfig::default().with_auto_connect(false));

        assert_eq!(config.sweep_interval_ms, 1000);
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.poll_interval_ms, 1);
        assert!(!config.discovery.auto_connect);
    }

    #[test]
    fn discovery_accepts_serial_profile_or_name() {
        let discovery = DiscoveryConfig::default();
        assert!(discovery.accepts(&DeviceInfo::new("A", "ESP train")));
        assert!(discovery.accepts(&DeviceInfo::new("B", "Phone").with_serial_profile(true)));
        assert!(!discovery.accepts(&DeviceInfo::new("C", "Phone")));

        let off = DiscoveryConfig::default().with_auto_connect(false);
        assert!(!off.accepts(&DeviceInfo::new("A", "ESP train")));
    }

    #[test]
    fn short_string_utf8_boundary() {
        let input = "🚂".repeat(20); // 80 bytes
        let s = short_string(&input);
        assert!(s.len() <= MAX_SHORT_STRING);
        assert_eq!(s.len() % 4, 0);
    }
}
