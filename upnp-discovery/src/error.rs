//! Error types for the discovery system.

use thiserror::Error;

use crate::types::UrnKind;

/// Error type for discovery operations.
///
/// Covers type URN canonicalization, description fetching and decoding,
/// and the control point lifecycle. Malformed SSDP traffic never surfaces
/// here; the control point drops it silently.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A device or service type string did not match
    /// `urn:<domain>:<kind>:<category>:<version>`
    #[error("Invalid {kind} type: {urn}")]
    MalformedTypeUrn { kind: UrnKind, urn: String },

    /// The description document is not well-formed XML
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// The description document parsed but never produced a device
    #[error("Incomplete device description")]
    IncompleteDescription,

    /// Description location does not use HTTP or HTTPS
    #[error("Invalid device description location, only HTTP and HTTPS are supported: {0}")]
    InvalidLocation(String),

    /// A URL in the description could not be resolved to an absolute URL
    #[error("Invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The description fetch returned a status other than 200
    #[error("Unexpected response status code: {0}")]
    UnexpectedHttpStatus(u16),

    /// Network-related errors (socket creation, HTTP requests, etc.)
    #[error("Network error: {0}")]
    Network(String),

    /// No device answered before the caller's deadline
    #[error("Search timed out")]
    SearchTimeout,

    /// The control point was closed
    #[error("Control point is closed")]
    Closed,

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<quick_xml::Error> for DiscoveryError {
    fn from(error: quick_xml::Error) -> Self {
        match error {
            // I/O failures surface from the streamed response body
            quick_xml::Error::Io(e) => DiscoveryError::Network(e.to_string()),
            other => DiscoveryError::XmlParse(other.to_string()),
        }
    }
}

/// Convenience Result type alias for discovery operations.
///
/// Equivalent to `std::result::Result<T, DiscoveryError>`.
pub type Result<T> = std::result::Result<T, DiscoveryError>;
