//! Canonical UPnP device and service types.
//!
//! Type URNs are interned in a process-wide registry: parsing the same URN
//! string twice yields the same `Arc`, so types can be compared by identity
//! with [`Arc::ptr_eq`]. The registry only ever grows.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use serde::{Serialize, Serializer};

use crate::error::{DiscoveryError, Result};

/// Domain used by types standardized by the UPnP Forum.
pub const SCHEMAS_UPNP_ORG: &str = "schemas-upnp-org";

/// Which half of the URN namespace a type lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrnKind {
    Device,
    Service,
}

impl UrnKind {
    fn as_str(self) -> &'static str {
        match self {
            UrnKind::Device => "device",
            UrnKind::Service => "service",
        }
    }
}

impl fmt::Display for UrnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A UPnP device category, e.g. `urn:schemas-upnp-org:device:InternetGatewayDevice:1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceType {
    category: String,
    version: u32,
    domain: String,
}

/// A UPnP service category, e.g. `urn:schemas-upnp-org:service:WANIPConnection:1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceType {
    category: String,
    version: u32,
    domain: String,
}

static DEVICE_TYPES: LazyLock<Mutex<HashMap<String, Arc<DeviceType>>>> =
    LazyLock::new(Default::default);

static SERVICE_TYPES: LazyLock<Mutex<HashMap<String, Arc<ServiceType>>>> =
    LazyLock::new(Default::default);

macro_rules! urn_type {
    ($ty:ident, $kind:expr, $registry:ident) => {
        impl $ty {
            /// Get the shared instance for `urn`, parsing and caching it on first use.
            ///
            /// # Errors
            ///
            /// Returns [`DiscoveryError::MalformedTypeUrn`] if `urn` does not match
            /// `urn:<domain>:<kind>:<category>:<positive integer>`.
            pub fn get(urn: &str) -> Result<Arc<$ty>> {
                let mut instances = $registry.lock();
                if let Some(existing) = instances.get(urn) {
                    return Ok(Arc::clone(existing));
                }

                let (domain, category, version) =
                    parse_urn(urn, $kind).ok_or_else(|| DiscoveryError::MalformedTypeUrn {
                        kind: $kind,
                        urn: urn.to_string(),
                    })?;
                let created = Arc::new($ty {
                    category: category.to_string(),
                    version,
                    domain: domain.to_string(),
                });
                instances.insert(urn.to_string(), Arc::clone(&created));
                Ok(created)
            }

            /// Category name, e.g. `InternetGatewayDevice` or `WANIPConnection`
            pub fn category(&self) -> &str {
                &self.category
            }

            pub fn version(&self) -> u32 {
                self.version
            }

            /// Naming authority, `schemas-upnp-org` for standard types
            pub fn domain(&self) -> &str {
                &self.domain
            }

            /// Whether this type lives in the UPnP Forum namespace
            pub fn is_standard(&self) -> bool {
                self.domain == SCHEMAS_UPNP_ORG
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    "urn:{}:{}:{}:{}",
                    self.domain, $kind, self.category, self.version
                )
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }
    };
}

urn_type!(DeviceType, UrnKind::Device, DEVICE_TYPES);
urn_type!(ServiceType, UrnKind::Service, SERVICE_TYPES);

/// Split `urn:<domain>:<kind>:<category>:<version>` into its parts.
fn parse_urn(urn: &str, kind: UrnKind) -> Option<(&str, &str, u32)> {
    let mut parts = urn.split(':');
    let (scheme, domain, urn_kind, category, version) = (
        parts.next()?,
        parts.next()?,
        parts.next()?,
        parts.next()?,
        parts.next()?,
    );
    if parts.next().is_some() || scheme != "urn" || urn_kind != kind.as_str() {
        return None;
    }
    if domain.is_empty() || category.is_empty() {
        return None;
    }
    if version.starts_with('0') || !version.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let version = version.parse::<u32>().ok()?;
    Some((domain, category, version))
}
