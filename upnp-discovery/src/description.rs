//! Device description decoding.
//!
//! The decoder is a push-down automaton fed with element start, text and
//! element end notifications from a streaming XML reader. It never looks
//! back at the document: partially built entities live on a scope stack,
//! and a parallel property stack records where each open element will be
//! stored in its parent once it closes.
//!
//! URLs may appear before the `URLBase` that governs them, so they are
//! collected raw during the pass and resolved in one final step once the
//! whole document has been read.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures::TryStreamExt;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::StatusCode;
use tokio_util::io::StreamReader;
use tracing::{debug, trace, warn};
use url::Url;

use crate::device::{Device, Icon, Service};
use crate::error::{DiscoveryError, Result};
use crate::types::{DeviceType, ServiceType};

/// HTTP client for description documents.
#[derive(Debug, Clone)]
pub struct DescriptionClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl DescriptionClient {
    /// Create a client with a 10 second request timeout
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(10))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }

    /// Fetch and decode the description document at `location`.
    ///
    /// The body is decoded as it arrives; the decoder never sees the whole
    /// document at once.
    ///
    /// # Errors
    ///
    /// - [`DiscoveryError::InvalidLocation`] unless `location` is an HTTP(S) URL
    /// - [`DiscoveryError::UnexpectedHttpStatus`] for any status other than 200
    /// - [`DiscoveryError::XmlParse`] / [`DiscoveryError::IncompleteDescription`]
    ///   from the decoder
    pub async fn fetch(&self, location: &str) -> Result<Device> {
        let url = Url::parse(location)
            .map_err(|_| DiscoveryError::InvalidLocation(location.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DiscoveryError::InvalidLocation(location.to_string()));
        }

        debug!("HTTP request {}", url);
        let response = self
            .http
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                DiscoveryError::Network(format!("Failed to fetch device description: {}", e))
            })?;

        if response.status() != StatusCode::OK {
            return Err(DiscoveryError::UnexpectedHttpStatus(response.status().as_u16()));
        }

        let body = Box::pin(
            response
                .bytes_stream()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e)),
        );
        let mut reader = Reader::from_reader(StreamReader::new(body));
        let mut decoder = DescriptionDecoder::new(url);
        let mut buf = Vec::new();
        loop {
            let event = reader.read_event_into_async(&mut buf).await?;
            if decoder.handle(event)? {
                break;
            }
            buf.clear();
        }
        decoder.finish()
    }
}

impl Default for DescriptionClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode an in-memory description document fetched from `location`.
pub fn decode_description(xml: &[u8], location: Url) -> Result<Device> {
    let mut reader = Reader::from_reader(xml);
    let mut decoder = DescriptionDecoder::new(location);
    let mut buf = Vec::new();
    loop {
        let event = reader.read_event_into(&mut buf)?;
        if decoder.handle(event)? {
            break;
        }
        buf.clear();
    }
    decoder.finish()
}

/// Leaf elements carrying a single text value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    DeviceType,
    FriendlyName,
    Manufacturer,
    ManufacturerUrl,
    ModelDescription,
    ModelName,
    ModelNumber,
    SerialNumber,
    Udn,
    PresentationUrl,
    ServiceType,
    ServiceId,
    ScpdUrl,
    ControlUrl,
    EventSubUrl,
    Mimetype,
    Width,
    Height,
    Depth,
    Url,
    UrlBase,
}

impl Field {
    fn from_element(name: &str) -> Option<Self> {
        Some(match name {
            "deviceType" => Field::DeviceType,
            "friendlyName" => Field::FriendlyName,
            "manufacturer" => Field::Manufacturer,
            "manufacturerURL" => Field::ManufacturerUrl,
            "modelDescription" => Field::ModelDescription,
            "modelName" => Field::ModelName,
            "modelNumber" => Field::ModelNumber,
            "serialNumber" => Field::SerialNumber,
            "UDN" => Field::Udn,
            "presentationURL" => Field::PresentationUrl,
            "serviceType" => Field::ServiceType,
            "serviceId" => Field::ServiceId,
            "SCPDURL" => Field::ScpdUrl,
            "controlURL" => Field::ControlUrl,
            "eventSubURL" => Field::EventSubUrl,
            "mimetype" => Field::Mimetype,
            "width" => Field::Width,
            "height" => Field::Height,
            "depth" => Field::Depth,
            "url" => Field::Url,
            "URLBase" => Field::UrlBase,
            _ => return None,
        })
    }

    fn is_url(self) -> bool {
        matches!(
            self,
            Field::ManufacturerUrl
                | Field::PresentationUrl
                | Field::ScpdUrl
                | Field::ControlUrl
                | Field::EventSubUrl
                | Field::Url
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Services,
    Icons,
    Devices,
}

impl ListKind {
    fn from_element(name: &str) -> Option<Self> {
        match name {
            "serviceList" => Some(ListKind::Services),
            "iconList" => Some(ListKind::Icons),
            "deviceList" => Some(ListKind::Devices),
            _ => None,
        }
    }
}

/// Where a closing element is stored in its parent scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Property {
    Field(Field),
    List(ListKind),
    Index(usize),
    /// A device not inside a `deviceList`
    Root,
    /// A list item outside of its list; dropped on close
    Orphan,
}

/// Index into the pending URL table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UrlSlot(usize);

#[derive(Debug, Default)]
struct DeviceScope {
    device_type: Option<Arc<DeviceType>>,
    friendly_name: Option<String>,
    manufacturer: Option<String>,
    manufacturer_url: Option<UrlSlot>,
    model_description: Option<String>,
    model_name: Option<String>,
    model_number: Option<String>,
    serial_number: Option<String>,
    udn: Option<String>,
    presentation_url: Option<UrlSlot>,
    services: Vec<ServiceScope>,
    icons: Vec<IconScope>,
    devices: Vec<DeviceScope>,
}

#[derive(Debug, Default)]
struct ServiceScope {
    service_type: Option<Arc<ServiceType>>,
    service_id: Option<String>,
    scpd_url: Option<UrlSlot>,
    control_url: Option<UrlSlot>,
    event_sub_url: Option<UrlSlot>,
}

#[derive(Debug, Default)]
struct IconScope {
    mimetype: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    depth: Option<u32>,
    url: Option<UrlSlot>,
}

#[derive(Debug)]
enum Scope {
    Device(Box<DeviceScope>),
    Service(ServiceScope),
    Icon(IconScope),
    Services(Vec<ServiceScope>),
    Icons(Vec<IconScope>),
    Devices(Vec<DeviceScope>),
}

impl Scope {
    fn list_len(&self) -> Option<(ListKind, usize)> {
        match self {
            Scope::Services(items) => Some((ListKind::Services, items.len())),
            Scope::Icons(items) => Some((ListKind::Icons, items.len())),
            Scope::Devices(items) => Some((ListKind::Devices, items.len())),
            _ => None,
        }
    }
}

/// Value of a closed leaf, already converted for its field.
enum Value {
    Text(String),
    Url(UrlSlot),
    DeviceType(Arc<DeviceType>),
    ServiceType(Arc<ServiceType>),
    Number(u32),
}

/// Streaming decoder building a [`Device`] from XML notifications.
struct DescriptionDecoder {
    location: Url,
    scopes: Vec<Scope>,
    properties: Vec<Property>,
    values: Vec<String>,
    in_leaf: bool,
    pending_urls: Vec<String>,
    base_url: Option<String>,
    result: Option<DeviceScope>,
    depth: usize,
    saw_root: bool,
}

impl DescriptionDecoder {
    fn new(location: Url) -> Self {
        Self {
            location,
            scopes: Vec::new(),
            properties: Vec::new(),
            values: Vec::new(),
            in_leaf: false,
            pending_urls: Vec::new(),
            base_url: None,
            result: None,
            depth: 0,
            saw_root: false,
        }
    }

    /// Feed one reader event, returning `true` at end of document.
    fn handle(&mut self, event: Event<'_>) -> Result<bool> {
        match event {
            Event::Start(element) => {
                let name = element_name(element.local_name().into_inner())?;
                self.start_element(name);
            }
            Event::Empty(element) => {
                let name = element_name(element.local_name().into_inner())?;
                self.start_element(name);
                self.end_element(name)?;
            }
            Event::End(element) => {
                let name = element_name(element.local_name().into_inner())?;
                self.end_element(name)?;
            }
            Event::Text(text) => {
                if self.in_leaf {
                    let text = text.unescape()?;
                    self.text(&text);
                }
            }
            Event::CData(data) => {
                if self.in_leaf {
                    let text = std::str::from_utf8(&data)
                        .map_err(|e| DiscoveryError::XmlParse(e.to_string()))?;
                    self.text(text);
                }
            }
            Event::Eof => return Ok(true),
            _ => {}
        }
        Ok(false)
    }

    fn start_element(&mut self, name: &str) {
        self.depth += 1;
        self.saw_root = true;
        self.in_leaf = false;

        if let Some(field) = Field::from_element(name) {
            self.properties.push(Property::Field(field));
            self.values.push(String::new());
            self.in_leaf = true;
            return;
        }

        if let Some(kind) = ListKind::from_element(name) {
            self.properties.push(Property::List(kind));
            self.scopes.push(match kind {
                ListKind::Services => Scope::Services(Vec::new()),
                ListKind::Icons => Scope::Icons(Vec::new()),
                ListKind::Devices => Scope::Devices(Vec::new()),
            });
            return;
        }

        let (expected, scope) = match name {
            "service" => (ListKind::Services, Scope::Service(ServiceScope::default())),
            "icon" => (ListKind::Icons, Scope::Icon(IconScope::default())),
            "device" => (ListKind::Devices, Scope::Device(Box::default())),
            _ => return,
        };
        let property = match self.scopes.last().and_then(Scope::list_len) {
            Some((kind, len)) if kind == expected => Property::Index(len),
            _ if expected == ListKind::Devices => Property::Root,
            _ => Property::Orphan,
        };
        self.properties.push(property);
        self.scopes.push(scope);
    }

    fn text(&mut self, text: &str) {
        if let Some(value) = self.values.last_mut() {
            value.push_str(text);
        }
    }

    fn end_element(&mut self, name: &str) -> Result<()> {
        self.depth = self.depth.saturating_sub(1);
        self.in_leaf = false;

        if let Some(field) = Field::from_element(name) {
            let property = self.properties.pop();
            let raw = self.values.pop().unwrap_or_default();
            debug_assert_eq!(property, Some(Property::Field(field)));
            return self.close_leaf(field, raw.trim());
        }

        if ListKind::from_element(name).is_some() {
            let property = self.properties.pop();
            if let (Some(Property::List(kind)), Some(list)) = (property, self.scopes.pop()) {
                self.close_list(kind, list);
            }
            return Ok(());
        }

        if matches!(name, "service" | "icon" | "device") {
            if let (Some(property), Some(scope)) = (self.properties.pop(), self.scopes.pop()) {
                self.close_item(property, scope);
            }
        }
        Ok(())
    }

    fn close_leaf(&mut self, field: Field, raw: &str) -> Result<()> {
        if raw.is_empty() {
            return Ok(());
        }
        if field == Field::UrlBase {
            self.base_url = Some(raw.to_string());
            return Ok(());
        }

        let value = match field {
            Field::DeviceType => Value::DeviceType(DeviceType::get(raw)?),
            Field::ServiceType => Value::ServiceType(ServiceType::get(raw)?),
            Field::Width | Field::Height | Field::Depth => match raw.parse::<u32>() {
                Ok(number) => Value::Number(number),
                Err(_) => {
                    warn!("Ignoring non-numeric icon dimension {:?}", raw);
                    return Ok(());
                }
            },
            _ if field.is_url() => {
                self.pending_urls.push(raw.to_string());
                Value::Url(UrlSlot(self.pending_urls.len() - 1))
            }
            _ => Value::Text(raw.to_string()),
        };

        let assigned = match self.scopes.last_mut() {
            Some(Scope::Device(device)) => assign_device(device, field, value),
            Some(Scope::Service(service)) => assign_service(service, field, value),
            Some(Scope::Icon(icon)) => assign_icon(icon, field, value),
            _ => false,
        };
        if !assigned {
            trace!("Ignoring {:?} outside of its parent element", field);
        }
        Ok(())
    }

    fn close_list(&mut self, kind: ListKind, list: Scope) {
        match (self.scopes.last_mut(), list) {
            (Some(Scope::Device(device)), Scope::Services(services)) => {
                device.services = services;
            }
            (Some(Scope::Device(device)), Scope::Icons(icons)) => {
                device.icons = icons;
            }
            (Some(Scope::Device(device)), Scope::Devices(devices)) => {
                device.devices = devices;
            }
            _ => trace!("Ignoring {:?} outside of a device", kind),
        }
    }

    fn close_item(&mut self, property: Property, scope: Scope) {
        match (property, scope) {
            (Property::Index(index), Scope::Service(service)) => {
                if let Some(Scope::Services(services)) = self.scopes.last_mut() {
                    services.insert(index.min(services.len()), service);
                }
            }
            (Property::Index(index), Scope::Icon(icon)) => {
                if let Some(Scope::Icons(icons)) = self.scopes.last_mut() {
                    icons.insert(index.min(icons.len()), icon);
                }
            }
            (Property::Index(index), Scope::Device(device)) => {
                if let Some(Scope::Devices(devices)) = self.scopes.last_mut() {
                    devices.insert(index.min(devices.len()), *device);
                }
            }
            (Property::Root, Scope::Device(device)) => match self.scopes.last_mut() {
                None => {
                    if self.result.is_none() {
                        self.result = Some(*device);
                    } else {
                        warn!("Ignoring additional top-level device");
                    }
                }
                Some(Scope::Device(parent)) => parent.devices.push(*device),
                Some(_) => trace!("Ignoring device nested in an unexpected element"),
            },
            (property, _) => trace!("Dropping orphaned element ({:?})", property),
        }
    }

    /// Resolve pending URLs against the document base and build the device.
    fn finish(self) -> Result<Device> {
        if !self.saw_root {
            return Err(DiscoveryError::XmlParse("no element found".to_string()));
        }
        if self.depth != 0 {
            return Err(DiscoveryError::XmlParse(format!(
                "unexpected end of document with {} unclosed element(s)",
                self.depth
            )));
        }
        let root = self.result.ok_or(DiscoveryError::IncompleteDescription)?;

        let base = match &self.base_url {
            Some(declared) => self.location.join(declared).map_err(|e| DiscoveryError::InvalidUrl {
                url: declared.clone(),
                reason: e.to_string(),
            })?,
            None => self.location.clone(),
        };
        let resolved = self
            .pending_urls
            .iter()
            .map(|raw| {
                base.join(raw).map_err(|e| DiscoveryError::InvalidUrl {
                    url: raw.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<Url>>>()?;

        debug!(
            "Decoded description from {} ({} URLs resolved against {})",
            self.location,
            resolved.len(),
            base
        );
        Ok(build_device(root, &self.location, &resolved))
    }
}

fn element_name(raw: &[u8]) -> Result<&str> {
    std::str::from_utf8(raw).map_err(|e| DiscoveryError::XmlParse(e.to_string()))
}

fn assign_device(device: &mut DeviceScope, field: Field, value: Value) -> bool {
    match (field, value) {
        (Field::DeviceType, Value::DeviceType(v)) => device.device_type = Some(v),
        (Field::FriendlyName, Value::Text(v)) => device.friendly_name = Some(v),
        (Field::Manufacturer, Value::Text(v)) => device.manufacturer = Some(v),
        (Field::ManufacturerUrl, Value::Url(v)) => device.manufacturer_url = Some(v),
        (Field::ModelDescription, Value::Text(v)) => device.model_description = Some(v),
        (Field::ModelName, Value::Text(v)) => device.model_name = Some(v),
        (Field::ModelNumber, Value::Text(v)) => device.model_number = Some(v),
        (Field::SerialNumber, Value::Text(v)) => device.serial_number = Some(v),
        (Field::Udn, Value::Text(v)) => device.udn = Some(v),
        (Field::PresentationUrl, Value::Url(v)) => device.presentation_url = Some(v),
        _ => return false,
    }
    true
}

fn assign_service(service: &mut ServiceScope, field: Field, value: Value) -> bool {
    match (field, value) {
        (Field::ServiceType, Value::ServiceType(v)) => service.service_type = Some(v),
        (Field::ServiceId, Value::Text(v)) => service.service_id = Some(v),
        (Field::ScpdUrl, Value::Url(v)) => service.scpd_url = Some(v),
        (Field::ControlUrl, Value::Url(v)) => service.control_url = Some(v),
        (Field::EventSubUrl, Value::Url(v)) => service.event_sub_url = Some(v),
        _ => return false,
    }
    true
}

fn assign_icon(icon: &mut IconScope, field: Field, value: Value) -> bool {
    match (field, value) {
        (Field::Mimetype, Value::Text(v)) => icon.mimetype = Some(v),
        (Field::Width, Value::Number(v)) => icon.width = Some(v),
        (Field::Height, Value::Number(v)) => icon.height = Some(v),
        (Field::Depth, Value::Number(v)) => icon.depth = Some(v),
        (Field::Url, Value::Url(v)) => icon.url = Some(v),
        _ => return false,
    }
    true
}

fn build_device(scope: DeviceScope, location: &Url, urls: &[Url]) -> Device {
    let url = |slot: Option<UrlSlot>| slot.and_then(|UrlSlot(index)| urls.get(index).cloned());
    Device {
        location: location.clone(),
        device_type: scope.device_type,
        friendly_name: scope.friendly_name,
        manufacturer: scope.manufacturer,
        manufacturer_url: url(scope.manufacturer_url),
        model_description: scope.model_description,
        model_name: scope.model_name,
        model_number: scope.model_number,
        serial_number: scope.serial_number,
        udn: scope.udn,
        presentation_url: url(scope.presentation_url),
        services: scope
            .services
            .into_iter()
            .map(|service| Service {
                service_type: service.service_type,
                service_id: service.service_id,
                scpd_url: url(service.scpd_url),
                control_url: url(service.control_url),
                event_sub_url: url(service.event_sub_url),
            })
            .collect(),
        icons: scope
            .icons
            .into_iter()
            .map(|icon| Icon {
                mimetype: icon.mimetype,
                width: icon.width,
                height: icon.height,
                depth: icon.depth,
                url: url(icon.url),
            })
            .collect(),
        devices: scope
            .devices
            .into_iter()
            .map(|device| build_device(device, location, urls))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn location() -> Url {
        Url::parse("http://192.168.1.1:5000/rootDesc.xml").unwrap()
    }

    const TWO_SERVICES: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device>
    <deviceType>urn:schemas-upnp-org:device:InternetGatewayDevice:1</deviceType>
    <friendlyName>Home Router</friendlyName>
    <manufacturer>Example &amp; Co</manufacturer>
    <UDN>uuid:11111111-2222-3333-4444-555555555555</UDN>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:Layer3Forwarding:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:L3Forwarding1</serviceId>
        <SCPDURL>/L3F.xml</SCPDURL>
        <controlURL>/ctl/L3F</controlURL>
        <eventSubURL>/evt/L3F</eventSubURL>
      </service>
      <service>
        <serviceType>urn:schemas-upnp-org:service:WANIPConnection:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:WANIPConn1</serviceId>
        <SCPDURL>/WANIPCn.xml</SCPDURL>
        <controlURL>/ctl/IPConn</controlURL>
        <eventSubURL>/evt/IPConn</eventSubURL>
      </service>
    </serviceList>
  </device>
</root>"#;

    #[test]
    fn test_decode_services_in_document_order() {
        let device = decode_description(TWO_SERVICES.as_bytes(), location()).unwrap();

        assert_eq!(device.friendly_name.as_deref(), Some("Home Router"));
        assert_eq!(device.manufacturer.as_deref(), Some("Example & Co"));
        assert_eq!(device.services.len(), 2);

        let l3f = ServiceType::get("urn:schemas-upnp-org:service:Layer3Forwarding:1").unwrap();
        let wan_ip = ServiceType::get("urn:schemas-upnp-org:service:WANIPConnection:1").unwrap();
        assert!(Arc::ptr_eq(device.services[0].service_type.as_ref().unwrap(), &l3f));
        assert!(Arc::ptr_eq(device.services[1].service_type.as_ref().unwrap(), &wan_ip));
        assert_eq!(
            device.services[1].service_id.as_deref(),
            Some("urn:upnp-org:serviceId:WANIPConn1")
        );
    }

    #[test]
    fn test_relative_urls_resolve_against_location() {
        let device = decode_description(TWO_SERVICES.as_bytes(), location()).unwrap();

        let service = &device.services[1];
        assert_eq!(
            service.control_url.as_ref().unwrap().as_str(),
            "http://192.168.1.1:5000/ctl/IPConn"
        );
        assert_eq!(
            service.scpd_url.as_ref().unwrap().as_str(),
            "http://192.168.1.1:5000/WANIPCn.xml"
        );
        assert_eq!(device.location, location());
    }

    #[test]
    fn test_url_base_declared_after_urls() {
        let xml = r#"<root>
  <device>
    <deviceType>urn:schemas-upnp-org:device:InternetGatewayDevice:1</deviceType>
    <presentationURL>index.html</presentationURL>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:WANIPConnection:1</serviceType>
        <controlURL>upnp/control/WANIPConn1</controlURL>
      </service>
    </serviceList>
  </device>
  <URLBase>http://10.0.0.1:80/</URLBase>
</root>"#;
        let device = decode_description(xml.as_bytes(), location()).unwrap();

        assert_eq!(
            device.services[0].control_url.as_ref().unwrap().as_str(),
            "http://10.0.0.1/upnp/control/WANIPConn1"
        );
        assert_eq!(
            device.presentation_url.as_ref().unwrap().as_str(),
            "http://10.0.0.1/index.html"
        );
    }

    #[test]
    fn test_absolute_urls_are_kept() {
        let xml = r#"<root><device>
    <manufacturerURL>https://www.example.com/</manufacturerURL>
</device></root>"#;
        let device = decode_description(xml.as_bytes(), location()).unwrap();
        assert_eq!(
            device.manufacturer_url.as_ref().unwrap().as_str(),
            "https://www.example.com/"
        );
    }

    #[test]
    fn test_icons_are_decoded() {
        let xml = r#"<root><device>
    <iconList>
      <icon><mimetype>image/png</mimetype><width>48</width><height>48</height><depth>24</depth><url>/icons/48.png</url></icon>
      <icon><mimetype>image/png</mimetype><width>large</width><height>120</height><depth>24</depth><url>/icons/120.png</url></icon>
    </iconList>
</device></root>"#;
        let device = decode_description(xml.as_bytes(), location()).unwrap();

        assert_eq!(device.icons.len(), 2);
        assert_eq!(device.icons[0].width, Some(48));
        assert_eq!(device.icons[0].depth, Some(24));
        assert_eq!(
            device.icons[0].url.as_ref().unwrap().as_str(),
            "http://192.168.1.1:5000/icons/48.png"
        );
        assert_eq!(device.icons[1].width, None);
        assert_eq!(device.icons[1].height, Some(120));
    }

    #[test]
    fn test_embedded_devices_are_retained_and_outermost_wins() {
        let xml = r#"<root><device>
    <deviceType>urn:schemas-upnp-org:device:InternetGatewayDevice:1</deviceType>
    <deviceList>
      <device>
        <deviceType>urn:schemas-upnp-org:device:WANDevice:1</deviceType>
        <deviceList>
          <device>
            <deviceType>urn:schemas-upnp-org:device:WANConnectionDevice:1</deviceType>
            <serviceList><service>
              <serviceType>urn:schemas-upnp-org:service:WANIPConnection:1</serviceType>
              <controlURL>/ctl/IPConn</controlURL>
            </service></serviceList>
          </device>
        </deviceList>
      </device>
    </deviceList>
    <friendlyName>Outer</friendlyName>
</device></root>"#;
        let device = decode_description(xml.as_bytes(), location()).unwrap();

        assert_eq!(device.friendly_name.as_deref(), Some("Outer"));
        assert_eq!(
            device.device_type.as_ref().unwrap().category(),
            "InternetGatewayDevice"
        );
        assert!(device.services.is_empty());
        assert_eq!(device.devices.len(), 1);
        let connection = &device.devices[0].devices[0];
        assert_eq!(
            connection.device_type.as_ref().unwrap().category(),
            "WANConnectionDevice"
        );
        assert_eq!(
            connection.services[0].control_url.as_ref().unwrap().as_str(),
            "http://192.168.1.1:5000/ctl/IPConn"
        );
        assert_eq!(connection.location, location());
    }

    #[test]
    fn test_text_split_across_events() {
        let xml = "<root><device><friendlyName>Living <![CDATA[Room]]> &lt;2&gt;</friendlyName></device></root>";
        let device = decode_description(xml.as_bytes(), location()).unwrap();
        assert_eq!(device.friendly_name.as_deref(), Some("Living Room <2>"));
    }

    #[test]
    fn test_namespace_prefixes_are_ignored() {
        let xml = r#"<d:root xmlns:d="urn:schemas-upnp-org:device-1-0"><d:device><d:UDN>uuid:abc</d:UDN></d:device></d:root>"#;
        let device = decode_description(xml.as_bytes(), location()).unwrap();
        assert_eq!(device.udn.as_deref(), Some("uuid:abc"));
    }

    #[test]
    fn test_empty_leaves_are_unset() {
        let xml = "<root><device><modelNumber/><serialNumber>  </serialNumber><presentationURL></presentationURL></device></root>";
        let device = decode_description(xml.as_bytes(), location()).unwrap();
        assert!(device.model_number.is_none());
        assert!(device.serial_number.is_none());
        assert!(device.presentation_url.is_none());
    }

    #[test]
    fn test_no_device_is_incomplete() {
        let xml = r#"<?xml version="1.0"?><root><specVersion><major>1</major></specVersion></root>"#;
        let result = decode_description(xml.as_bytes(), location());
        assert!(matches!(result, Err(DiscoveryError::IncompleteDescription)));
    }

    #[rstest]
    #[case("")]
    #[case("<root><device><friendlyName>Router</friendlyName>")]
    #[case("<root><device><friendlyName>Router</device></root>")]
    #[case("<root><device><UDN>uuid:1</UDN></device>")]
    fn test_invalid_xml_fails(#[case] xml: &str) {
        let result = decode_description(xml.as_bytes(), location());
        assert!(
            matches!(result, Err(DiscoveryError::XmlParse(_))),
            "expected XmlParse for {:?}, got {:?}",
            xml,
            result
        );
    }

    #[test]
    fn test_malformed_device_type_fails() {
        let xml = "<root><device><deviceType>not-a-urn</deviceType></device></root>";
        let result = decode_description(xml.as_bytes(), location());
        assert!(matches!(result, Err(DiscoveryError::MalformedTypeUrn { .. })));
    }

    #[test]
    fn test_orphaned_service_is_dropped() {
        let xml = "<root><device><service><serviceId>stray</serviceId></service><UDN>uuid:1</UDN></device></root>";
        let device = decode_description(xml.as_bytes(), location()).unwrap();
        assert!(device.services.is_empty());
        assert_eq!(device.udn.as_deref(), Some("uuid:1"));
    }
}
