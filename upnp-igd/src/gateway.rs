//! Gateway control client

use soap_client::SoapClient;
use tracing::debug;
use upnp_discovery::Url;

use crate::action::{
    AddPortMapping, ConnectionTypeInfo, DeletePortMapping, ExternalIpAddress, GatewayAction,
    GetConnectionTypeInfo, GetExternalIpAddress, Protocol,
};
use crate::error::{IgdError, Result};

/// Device type searched for when looking for a gateway
pub const INTERNET_GATEWAY_DEVICE: &str = "urn:schemas-upnp-org:device:InternetGatewayDevice:1";

/// Service type every [`Gateway`] action is addressed to
pub const WANIP_CONNECTION: &str = "urn:schemas-upnp-org:service:WANIPConnection:1";

/// Control endpoint of a gateway's WANIPConnection service.
///
/// A gateway is a plain `{host, port, path}` handle; it holds no reference to
/// the device it was found on and can be stored and reused freely.
///
/// # Example
///
/// ```no_run
/// use upnp_igd::{Gateway, Protocol};
///
/// # async fn run() -> upnp_igd::Result<()> {
/// let gateway = Gateway::new("192.168.1.1", 5000, "/ctl/IPConn");
/// let ip = gateway.get_external_ip_address().await?;
/// println!("External address: {}", ip.new_external_ip_address);
///
/// gateway
///     .add_port_mapping(Protocol::Tcp, 8080, 8080, "192.168.1.20", "web server")
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Gateway {
    host: String,
    port: u16,
    path: String,
    soap_client: SoapClient,
}

impl Gateway {
    pub fn new(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self::with_soap_client(host, port, path, SoapClient::new())
    }

    /// Create a gateway with a custom SOAP client (e.g. different timeouts)
    pub fn with_soap_client(
        host: impl Into<String>,
        port: u16,
        path: impl Into<String>,
        soap_client: SoapClient,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            path: path.into(),
            soap_client,
        }
    }

    /// Split an absolute control URL into a gateway endpoint.
    ///
    /// A URL without an explicit port uses the scheme's default.
    pub fn from_control_url(control_url: &Url) -> Result<Self> {
        if control_url.scheme() != "http" {
            return Err(IgdError::InvalidControlUrl(control_url.to_string()));
        }
        let host = control_url
            .host_str()
            .ok_or_else(|| IgdError::InvalidControlUrl(control_url.to_string()))?;
        let port = control_url
            .port_or_known_default()
            .ok_or_else(|| IgdError::InvalidControlUrl(control_url.to_string()))?;

        let mut path = control_url.path().to_string();
        if let Some(query) = control_url.query() {
            path.push('?');
            path.push_str(query);
        }
        Ok(Self::new(host, port, path))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn control_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.path)
    }

    /// Invoke any [`GatewayAction`] on this gateway
    pub async fn execute<A: GatewayAction>(&self, action: &A) -> Result<A::Response> {
        let arguments = action.arguments();
        let borrowed: Vec<(&str, &str)> = arguments
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .collect();

        debug!("Gateway {} {}", A::ACTION, self.control_url());
        let response = self
            .soap_client
            .call(&self.control_url(), WANIP_CONNECTION, A::ACTION, &borrowed)
            .await?;
        Ok(A::parse_response(&response)?)
    }

    /// Current connection type and the types the connection supports
    pub async fn get_connection_type_info(&self) -> Result<ConnectionTypeInfo> {
        self.execute(&GetConnectionTypeInfo).await
    }

    pub async fn get_external_ip_address(&self) -> Result<ExternalIpAddress> {
        self.execute(&GetExternalIpAddress).await
    }

    /// Forward `external_port` on the gateway to `internal_client:internal_port`
    pub async fn add_port_mapping(
        &self,
        protocol: Protocol,
        external_port: u16,
        internal_port: u16,
        internal_client: &str,
        description: &str,
    ) -> Result<()> {
        self.execute(&AddPortMapping {
            protocol,
            external_port,
            internal_port,
            internal_client: internal_client.to_string(),
            description: description.to_string(),
        })
        .await
    }

    pub async fn delete_port_mapping(&self, protocol: Protocol, external_port: u16) -> Result<()> {
        self.execute(&DeletePortMapping {
            protocol,
            external_port,
        })
        .await
    }
}
