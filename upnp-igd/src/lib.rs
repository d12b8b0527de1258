//! UPnP internet gateway discovery and control
//!
//! Finds a gateway with SSDP, reads its description, and drives its
//! WANIPConnection service over SOAP: query the external address and the
//! connection type, add and remove port mappings.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use upnp_igd::{search_gateway, Protocol};
//!
//! # async fn run() -> upnp_igd::Result<()> {
//! let gateway = search_gateway(Duration::from_secs(5)).await?;
//! let ip = gateway.get_external_ip_address().await?;
//! println!("External address: {}", ip.new_external_ip_address);
//!
//! gateway
//!     .add_port_mapping(Protocol::Udp, 6881, 6881, "192.168.1.20", "torrent")
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! Discovery and SOAP transport live in their own crates and are re-exported
//! as [`discovery`] and [`soap`].

pub mod action;
mod error;
mod gateway;
pub mod logging;
mod search;

pub use action::{ConnectionTypeInfo, ExternalIpAddress, GatewayAction, Protocol};
pub use error::{IgdError, Result};
pub use gateway::{Gateway, INTERNET_GATEWAY_DEVICE, WANIP_CONNECTION};
pub use search::{search_gateway, search_gateway_with};

pub use soap_client as soap;
pub use upnp_discovery as discovery;
