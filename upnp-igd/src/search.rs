//! Discovery-to-gateway flow: search, describe, locate WANIPConnection.

use std::collections::HashSet;
use std::pin::pin;
use std::time::Duration;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, info, warn};
use upnp_discovery::{
    ControlPoint, DescriptionClient, DiscoveryError, ServiceType, SsdpConfig, SsdpEvent,
};

use crate::error::{IgdError, Result};
use crate::gateway::{Gateway, INTERNET_GATEWAY_DEVICE, WANIP_CONNECTION};

/// Find the first gateway on the network that exposes a WANIPConnection service.
///
/// Uses a search-only control point, so port 1900 is never bound.
///
/// # Errors
///
/// - [`DiscoveryError::SearchTimeout`] if no gateway is found within `timeout`
///   or before the search window closes
/// - any error from fetching a responding gateway's description
pub async fn search_gateway(timeout: Duration) -> Result<Gateway> {
    let control_point = ControlPoint::bind(SsdpConfig::search_only()).await?;
    search_gateway_with(&control_point, &DescriptionClient::new(), timeout).await
}

/// [`search_gateway`] on an existing control point and description client
pub async fn search_gateway_with(
    control_point: &ControlPoint,
    client: &DescriptionClient,
    timeout: Duration,
) -> Result<Gateway> {
    match tokio::time::timeout(timeout, find_gateway(control_point, client)).await {
        Ok(result) => result,
        Err(_) => {
            debug!("No gateway found within {:?}", timeout);
            Err(DiscoveryError::SearchTimeout.into())
        }
    }
}

async fn find_gateway(control_point: &ControlPoint, client: &DescriptionClient) -> Result<Gateway> {
    let wanip = ServiceType::get(WANIP_CONNECTION)?;
    let mut events = control_point.subscribe();
    let window = control_point.search(INTERNET_GATEWAY_DEVICE).await?;

    let mut finished = pin!(window.finished());
    let mut window_open = true;
    let mut seen_locations = HashSet::new();
    loop {
        let event = if window_open {
            tokio::select! {
                _ = &mut finished => {
                    window_open = false;
                    continue;
                }
                event = events.recv() => match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Gateway search fell behind, {} event(s) skipped", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => return Err(DiscoveryError::Closed.into()),
                },
            }
        } else {
            // Drain what the closed window already queued
            match events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => return Err(DiscoveryError::SearchTimeout.into()),
            }
        };

        let SsdpEvent::DeviceFound(headers) = event else {
            continue;
        };
        if headers.st() != Some(INTERNET_GATEWAY_DEVICE) {
            continue;
        }
        let Some(location) = headers.location() else {
            continue;
        };
        if !seen_locations.insert(location.to_string()) {
            continue;
        }

        let device = client.fetch(location).await?;
        let control_url = device
            .find_service(&wanip)
            .and_then(|service| service.control_url.as_ref());
        match control_url {
            Some(control_url) => {
                let gateway = Gateway::from_control_url(control_url)?;
                info!(
                    "Found gateway {:?} at {}",
                    device.friendly_name.as_deref().unwrap_or("unnamed"),
                    gateway.control_url()
                );
                return Ok(gateway);
            }
            None => debug!("Skipping {}: no {} control URL", location, WANIP_CONNECTION),
        }
    }
}
