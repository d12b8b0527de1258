//! Error types for the SOAP client

use std::fmt;

use thiserror::Error;

/// Errors that can occur during SOAP communication
#[derive(Debug, Error)]
pub enum SoapError {
    /// The device rejected the action's arguments (HTTP 402)
    #[error("Invalid Args")]
    InvalidArguments,

    /// The device could not perform the action (HTTP 501)
    #[error("Action Failed")]
    ActionFailed,

    /// Any other non-200 response
    #[error("Unexpected HTTP status {status}{}", fault_suffix(.fault))]
    UnexpectedHttpStatus {
        status: u16,
        /// UPnP error detail, when the body carried one
        fault: Option<UpnpFault>,
    },

    /// A required output argument was absent from the response body
    #[error("Missing argument: {0}")]
    MissingArgument(String),

    /// Network or HTTP communication error
    #[error("Network/HTTP error: {0}")]
    Network(String),

    /// The control URL is not an absolute HTTP URL
    #[error("Invalid control endpoint: {0}")]
    InvalidEndpoint(String),
}

fn fault_suffix(fault: &Option<UpnpFault>) -> String {
    fault
        .as_ref()
        .map(|fault| format!(" ({})", fault))
        .unwrap_or_default()
}

/// The `<UPnPError>` detail of a SOAP fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpnpFault {
    pub code: u16,
    pub description: String,
}

impl fmt::Display for UpnpFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.description.is_empty() {
            write!(f, "UPnP error {}", self.code)
        } else {
            write!(f, "UPnP error {}: {}", self.code, self.description)
        }
    }
}
