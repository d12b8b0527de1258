//! Find the gateway and print its external address and connection type
//!
//! Usage: cargo run -p upnp-igd --example external_ip [timeout-seconds]

use std::time::Duration;

use upnp_igd::logging::init_logging_from_env;
use upnp_igd::search_gateway;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_from_env()?;
    let timeout = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);

    let gateway = search_gateway(Duration::from_secs(timeout)).await?;
    println!("Gateway:         {}", gateway.control_url());

    let ip = gateway.get_external_ip_address().await?;
    println!("External IP:     {}", ip.new_external_ip_address);

    let info = gateway.get_connection_type_info().await?;
    println!("Connection type: {}", info.new_connection_type);
    println!("Possible types:  {}", info.new_possible_connection_types);
    Ok(())
}
