//! Print the description of the first device that answers a search, as JSON
//!
//! Usage: cargo run -p upnp-igd --example describe_first [search-target]

use upnp_igd::discovery::{ControlPoint, DescriptionClient, SsdpConfig, SsdpEvent, SSDP_ALL};
use upnp_igd::logging::init_logging_from_env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_from_env()?;
    let search_target = std::env::args().nth(1).unwrap_or_else(|| SSDP_ALL.to_string());

    let control_point = ControlPoint::bind(SsdpConfig::search_only()).await?;
    let mut events = control_point.subscribe();
    let window = control_point.search(&search_target).await?;

    let location = tokio::select! {
        _ = window.finished() => None,
        location = async {
            while let Ok(event) = events.recv().await {
                if let SsdpEvent::DeviceFound(headers) = event {
                    if let Some(location) = headers.location() {
                        return Some(location.to_string());
                    }
                }
            }
            None
        } => location,
    };

    let Some(location) = location else {
        eprintln!("No device answered");
        return Ok(());
    };
    control_point.close();

    match DescriptionClient::new().fetch(&location).await {
        Ok(device) => println!("{}", serde_json::to_string_pretty(&device)?),
        Err(e) => eprintln!("{}: {}", location, e),
    }
    Ok(())
}
