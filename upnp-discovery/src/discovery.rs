//! One-shot discovery of described devices.
//!
//! This module combines a single search with description fetching:
//! 1. Sends one M-SEARCH through a [`ControlPoint`]
//! 2. Collects `DeviceFound` events until the search window closes
//! 3. De-duplicates replies by location
//! 4. Fetches and decodes each description concurrently, keeping failures

use std::collections::HashSet;
use std::pin::pin;

use futures::future::join_all;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::warn;

use crate::config::SSDP_ALL;
use crate::description::DescriptionClient;
use crate::device::Device;
use crate::error::Result;
use crate::ssdp::{ControlPoint, SsdpEvent};

/// Search for `search_target` and describe every device that answered within
/// the search window.
///
/// Returns one `(location, description)` pair per distinct location, in the
/// order the replies arrived. A description that cannot be fetched or decoded
/// carries its error; the other locations are unaffected.
///
/// # Examples
///
/// ```no_run
/// use upnp_discovery::{discover_devices, ControlPoint, DescriptionClient, SsdpConfig};
///
/// # async fn run() -> upnp_discovery::Result<()> {
/// let control_point = ControlPoint::bind(SsdpConfig::search_only()).await?;
/// let found = discover_devices(&control_point, &DescriptionClient::new(), "upnp:rootdevice").await?;
/// for (location, description) in found {
///     match description {
///         Ok(device) => println!("{:?} at {}", device.friendly_name, location),
///         Err(e) => eprintln!("{}: {}", location, e),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn discover_devices(
    control_point: &ControlPoint,
    client: &DescriptionClient,
    search_target: &str,
) -> Result<Vec<(String, Result<Device>)>> {
    let mut events = control_point.subscribe();
    let window = control_point.search(search_target).await?;

    let mut seen_locations = HashSet::new();
    let mut locations = Vec::new();
    let mut record = |event: SsdpEvent| {
        let SsdpEvent::DeviceFound(headers) = event else {
            return;
        };
        // Replies to other searches on the same control point share the channel
        if search_target != SSDP_ALL && headers.st() != Some(search_target) {
            return;
        }
        if let Some(location) = headers.location() {
            if seen_locations.insert(location.to_string()) {
                locations.push(location.to_string());
            }
        }
    };

    let mut finished = pin!(window.finished());
    loop {
        tokio::select! {
            _ = &mut finished => break,
            event = events.recv() => match event {
                Ok(event) => record(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Discovery fell behind, {} event(s) skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    // The window's task has exited, so all of its events are already queued
    loop {
        match events.try_recv() {
            Ok(event) => record(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }

    let fetches = locations.into_iter().map(|location| async move {
        let description = client.fetch(&location).await;
        if let Err(e) = &description {
            warn!("Failed to describe device at {}: {}", location, e);
        }
        (location, description)
    });
    Ok(join_all(fetches).await)
}
