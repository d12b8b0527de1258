//! UPnP device discovery library
//!
//! This crate discovers UPnP devices on the local network using SSDP
//! (Simple Service Discovery Protocol) and decodes their description
//! documents into a typed device tree.
//!
//! # Events
//!
//! A [`ControlPoint`] publishes every search reply and advertisement it
//! receives as an [`SsdpEvent`]:
//!
//! ```no_run
//! use upnp_discovery::{ControlPoint, DescriptionClient, SsdpConfig, SsdpEvent};
//!
//! # async fn run() -> upnp_discovery::Result<()> {
//! let control_point = ControlPoint::bind(SsdpConfig::default()).await?;
//! let mut events = control_point.subscribe();
//! control_point.search("upnp:rootdevice").await?;
//!
//! let client = DescriptionClient::new();
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         SsdpEvent::DeviceFound(headers) | SsdpEvent::DeviceAvailable(headers) => {
//!             if let Some(location) = headers.location() {
//!                 let device = client.fetch(location).await?;
//!                 println!("Found {:?}", device.friendly_name);
//!             }
//!         }
//!         SsdpEvent::DeviceUnavailable(headers) => println!("Gone: {:?}", headers.usn()),
//!         SsdpEvent::DeviceUpdate(_) => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # One-shot Discovery
//!
//! [`discover_devices`] runs a single search window and returns, for every
//! location that answered, its decoded description or the error that
//! prevented decoding it.

mod config;
mod description;
pub mod device;
mod discovery;
mod error;
pub mod httpu;
mod ssdp;
pub mod types;

pub use config::{SsdpConfig, SSDP_ALL, SSDP_MULTICAST_ADDR, SSDP_PORT};
pub use description::{decode_description, DescriptionClient};
pub use device::{Device, Icon, Service};
pub use discovery::discover_devices;
pub use error::{DiscoveryError, Result};
pub use httpu::Headers;
pub use ssdp::{ControlPoint, SearchWindow, SsdpEvent};
pub use types::{DeviceType, ServiceType, UrnKind};

/// Re-exported so callers can name description URLs without a direct dependency
pub use url::Url;
