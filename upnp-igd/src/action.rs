//! Typed WANIPConnection actions
//!
//! Each action is a request struct implementing [`GatewayAction`], which
//! names the SOAP action, lists its input arguments in wire order and
//! decodes the output arguments into a typed response.

use std::fmt;

use soap_client::{SoapError, SoapResponse};

/// Base trait for all WANIPConnection actions
pub trait GatewayAction {
    /// Typed output arguments
    type Response;

    /// The SOAP action name
    const ACTION: &'static str;

    /// Input arguments as `(name, value)` pairs, in the order the action declares them
    fn arguments(&self) -> Vec<(&'static str, String)>;

    /// Decode the output arguments from a successful response
    fn parse_response(response: &SoapResponse) -> Result<Self::Response, SoapError>;
}

/// Transport protocol of a port mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `GetConnectionTypeInfo`
#[derive(Debug, Clone, Copy, Default)]
pub struct GetConnectionTypeInfo;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTypeInfo {
    pub new_connection_type: String,
    pub new_possible_connection_types: String,
}

impl GatewayAction for GetConnectionTypeInfo {
    type Response = ConnectionTypeInfo;
    const ACTION: &'static str = "GetConnectionTypeInfo";

    fn arguments(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn parse_response(response: &SoapResponse) -> Result<Self::Response, SoapError> {
        Ok(ConnectionTypeInfo {
            new_connection_type: response.argument("NewConnectionType")?,
            new_possible_connection_types: response.argument("NewPossibleConnectionTypes")?,
        })
    }
}

/// `GetExternalIPAddress`
#[derive(Debug, Clone, Copy, Default)]
pub struct GetExternalIpAddress;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIpAddress {
    pub new_external_ip_address: String,
}

impl GatewayAction for GetExternalIpAddress {
    type Response = ExternalIpAddress;
    const ACTION: &'static str = "GetExternalIPAddress";

    fn arguments(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn parse_response(response: &SoapResponse) -> Result<Self::Response, SoapError> {
        Ok(ExternalIpAddress {
            new_external_ip_address: response.argument("NewExternalIPAddress")?,
        })
    }
}

/// `AddPortMapping` for any remote host, always enabled, with an unlimited lease
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPortMapping {
    pub protocol: Protocol,
    pub external_port: u16,
    pub internal_port: u16,
    pub internal_client: String,
    pub description: String,
}

impl GatewayAction for AddPortMapping {
    type Response = ();
    const ACTION: &'static str = "AddPortMapping";

    fn arguments(&self) -> Vec<(&'static str, String)> {
        vec![
            ("NewRemoteHost", String::new()),
            ("NewExternalPort", self.external_port.to_string()),
            ("NewProtocol", self.protocol.to_string()),
            ("NewInternalPort", self.internal_port.to_string()),
            ("NewInternalClient", self.internal_client.clone()),
            ("NewEnabled", "1".to_string()),
            ("NewPortMappingDescription", self.description.clone()),
            ("NewLeaseDuration", "0".to_string()),
        ]
    }

    fn parse_response(_response: &SoapResponse) -> Result<Self::Response, SoapError> {
        Ok(())
    }
}

/// `DeletePortMapping` for a mapping added without a remote host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletePortMapping {
    pub protocol: Protocol,
    pub external_port: u16,
}

impl GatewayAction for DeletePortMapping {
    type Response = ();
    const ACTION: &'static str = "DeletePortMapping";

    fn arguments(&self) -> Vec<(&'static str, String)> {
        vec![
            ("NewRemoteHost", String::new()),
            ("NewExternalPort", self.external_port.to_string()),
            ("NewProtocol", self.protocol.to_string()),
        ]
    }

    fn parse_response(_response: &SoapResponse) -> Result<Self::Response, SoapError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_port_mapping_argument_order() {
        let action = AddPortMapping {
            protocol: Protocol::Udp,
            external_port: 6881,
            internal_port: 6882,
            internal_client: "192.168.1.20".to_string(),
            description: "torrent".to_string(),
        };
        let names: Vec<_> = action.arguments().iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            vec![
                "NewRemoteHost",
                "NewExternalPort",
                "NewProtocol",
                "NewInternalPort",
                "NewInternalClient",
                "NewEnabled",
                "NewPortMappingDescription",
                "NewLeaseDuration",
            ]
        );

        let arguments = action.arguments();
        assert_eq!(arguments[0].1, "");
        assert_eq!(arguments[1].1, "6881");
        assert_eq!(arguments[2].1, "UDP");
        assert_eq!(arguments[3].1, "6882");
        assert_eq!(arguments[5].1, "1");
        assert_eq!(arguments[7].1, "0");
    }

    #[test]
    fn test_delete_port_mapping_arguments() {
        let action = DeletePortMapping {
            protocol: Protocol::Tcp,
            external_port: 8080,
        };
        assert_eq!(
            action.arguments(),
            vec![
                ("NewRemoteHost", String::new()),
                ("NewExternalPort", "8080".to_string()),
                ("NewProtocol", "TCP".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_connection_type_info() {
        let response = SoapResponse::new(
            "<NewConnectionType>IP_Routed</NewConnectionType>\
             <NewPossibleConnectionTypes>IP_Routed</NewPossibleConnectionTypes>",
        );
        let info = GetConnectionTypeInfo::parse_response(&response).unwrap();
        assert_eq!(info.new_connection_type, "IP_Routed");
        assert_eq!(info.new_possible_connection_types, "IP_Routed");
    }

    #[test]
    fn test_parse_connection_type_info_requires_both_arguments() {
        let response = SoapResponse::new("<NewConnectionType>IP_Routed</NewConnectionType>");
        match GetConnectionTypeInfo::parse_response(&response) {
            Err(SoapError::MissingArgument(name)) => assert_eq!(name, "NewPossibleConnectionTypes"),
            other => panic!("Expected MissingArgument, got {:?}", other),
        }
    }

    #[test]
    fn test_protocol_display() {
        assert_eq!(Protocol::Tcp.to_string(), "TCP");
        assert_eq!(Protocol::Udp.as_str(), "UDP");
    }
}
