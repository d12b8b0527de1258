//! Configuration for the SSDP control point.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use crate::error::{DiscoveryError, Result};

/// Well-known SSDP multicast group
pub const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// Well-known SSDP port
pub const SSDP_PORT: u16 = 1900;

/// Search target matching every device and service
pub const SSDP_ALL: &str = "ssdp:all";

/// Configuration for a [`ControlPoint`](crate::ControlPoint)
#[derive(Debug, Clone)]
pub struct SsdpConfig {
    /// Group that M-SEARCH requests are sent to and advertisements arrive on
    /// Default: 239.255.255.250
    pub multicast_addr: Ipv4Addr,

    /// Port of the multicast group
    /// Default: 1900
    pub port: u16,

    /// Local interface used to join the multicast group
    /// Default: 0.0.0.0 (let the OS pick)
    pub interface: Ipv4Addr,

    /// Maximum wait, in seconds, devices may delay their search responses
    /// Default: 3
    pub mx: u8,

    /// Bind the advertisement socket and emit NOTIFY events
    /// Default: true
    pub listen_advertisements: bool,

    /// Capacity of the event broadcast channel
    /// Default: 256
    pub event_buffer_size: usize,

    /// Receive buffer size for a single datagram
    /// Default: 8192
    pub max_datagram_size: usize,
}

impl Default for SsdpConfig {
    fn default() -> Self {
        Self {
            multicast_addr: SSDP_MULTICAST_ADDR,
            port: SSDP_PORT,
            interface: Ipv4Addr::UNSPECIFIED,
            mx: 3,
            listen_advertisements: true,
            event_buffer_size: 256,
            max_datagram_size: 8192,
        }
    }
}

impl SsdpConfig {
    /// Create a new SsdpConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Control point that only searches and never binds the SSDP port
    pub fn search_only() -> Self {
        Self {
            listen_advertisements: false,
            ..Default::default()
        }
    }

    /// Destination of outgoing M-SEARCH requests
    pub fn search_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.multicast_addr, self.port)
    }

    /// How long a search keeps its reply socket open: MX plus one second
    pub fn search_window(&self) -> Duration {
        Duration::from_secs(u64::from(self.mx) + 1)
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.mx == 0 {
            return Err(DiscoveryError::Configuration(
                "MX must be at least 1 second".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(DiscoveryError::Configuration(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.max_datagram_size == 0 {
            return Err(DiscoveryError::Configuration(
                "Max datagram size must be greater than 0".to_string(),
            ));
        }

        if self.listen_advertisements && !self.multicast_addr.is_multicast() {
            return Err(DiscoveryError::Configuration(format!(
                "{} is not a multicast group",
                self.multicast_addr
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SsdpConfig::default();
        assert_eq!(config.search_addr().to_string(), "239.255.255.250:1900");
        assert_eq!(config.mx, 3);
        assert_eq!(config.search_window(), Duration::from_secs(4));
        assert!(config.listen_advertisements);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_search_only_preset() {
        let config = SsdpConfig::search_only();
        assert!(!config.listen_advertisements);
        assert_eq!(config.mx, 3);
    }

    #[test]
    fn test_validation_errors() {
        let config = SsdpConfig {
            mx: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SsdpConfig {
            event_buffer_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SsdpConfig {
            multicast_addr: Ipv4Addr::LOCALHOST,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        // Unicast targets are fine when nothing joins the group
        let config = SsdpConfig {
            multicast_addr: Ipv4Addr::LOCALHOST,
            ..SsdpConfig::search_only()
        };
        assert!(config.validate().is_ok());
    }
}
