//! Error types for gateway discovery and control

use soap_client::SoapError;
use thiserror::Error;
use upnp_discovery::DiscoveryError;

/// Errors returned by [`Gateway`](crate::Gateway) actions and the gateway search
#[derive(Debug, Error)]
pub enum IgdError {
    /// Searching for or describing the gateway failed
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The gateway rejected or failed a control action
    #[error(transparent)]
    Soap(#[from] SoapError),

    /// A service control URL cannot be turned into a gateway endpoint
    #[error("Invalid control URL: {0}")]
    InvalidControlUrl(String),
}

pub type Result<T> = std::result::Result<T, IgdError>;
