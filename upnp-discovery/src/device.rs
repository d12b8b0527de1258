//! UPnP device model.
//!
//! A [`Device`] starts out holding only the location it was discovered at and
//! is filled in by a description fetch. Every URL stored on a decoded entity
//! is absolute.

use std::sync::Arc;

use serde::Serialize;
use url::Url;

use crate::description::DescriptionClient;
use crate::error::Result;
use crate::types::{DeviceType, ServiceType};

/// A UPnP device and the services, icons and embedded devices it declares.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// URL of the description document
    pub location: Url,
    pub device_type: Option<Arc<DeviceType>>,
    pub friendly_name: Option<String>,
    pub manufacturer: Option<String>,
    #[serde(rename = "manufacturerURL")]
    pub manufacturer_url: Option<Url>,
    pub model_description: Option<String>,
    pub model_name: Option<String>,
    pub model_number: Option<String>,
    pub serial_number: Option<String>,
    #[serde(rename = "UDN")]
    pub udn: Option<String>,
    #[serde(rename = "presentationURL")]
    pub presentation_url: Option<Url>,
    pub services: Vec<Service>,
    pub icons: Vec<Icon>,
    /// Embedded devices from `deviceList`
    pub devices: Vec<Device>,
}

/// A service declared by a device.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub service_type: Option<Arc<ServiceType>>,
    pub service_id: Option<String>,
    #[serde(rename = "SCPDURL")]
    pub scpd_url: Option<Url>,
    #[serde(rename = "controlURL")]
    pub control_url: Option<Url>,
    #[serde(rename = "eventSubURL")]
    pub event_sub_url: Option<Url>,
}

/// An icon declared by a device.
#[derive(Debug, Clone, Serialize)]
pub struct Icon {
    pub mimetype: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub depth: Option<u32>,
    pub url: Option<Url>,
}

impl Device {
    /// Create an empty device known only by its description location
    pub fn new(location: Url) -> Self {
        Self {
            location,
            device_type: None,
            friendly_name: None,
            manufacturer: None,
            manufacturer_url: None,
            model_description: None,
            model_name: None,
            model_number: None,
            serial_number: None,
            udn: None,
            presentation_url: None,
            services: Vec::new(),
            icons: Vec::new(),
            devices: Vec::new(),
        }
    }

    /// Fetch the description at `self.location` and fill this device in place.
    ///
    /// On error the device is left untouched.
    pub async fn load_description(&mut self, client: &DescriptionClient) -> Result<()> {
        let described = client.fetch(self.location.as_str()).await?;
        *self = Device {
            location: self.location.clone(),
            ..described
        };
        Ok(())
    }

    /// Find the first service of `service_type`, searching embedded devices depth-first
    pub fn find_service(&self, service_type: &Arc<ServiceType>) -> Option<&Service> {
        self.services
            .iter()
            .find(|service| service.service_type.as_ref() == Some(service_type))
            .or_else(|| {
                self.devices
                    .iter()
                    .find_map(|device| device.find_service(service_type))
            })
    }

    /// This device followed by all embedded devices, depth-first
    pub fn all_devices(&self) -> Vec<&Device> {
        let mut devices = vec![self];
        for embedded in &self.devices {
            devices.extend(embedded.all_devices());
        }
        devices
    }
}
