//! Full search-describe-control flow against a loopback responder and mock HTTP server

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use tokio::net::UdpSocket;
use upnp_igd::discovery::{ControlPoint, DescriptionClient, DiscoveryError, SsdpConfig};
use upnp_igd::{search_gateway_with, IgdError, INTERNET_GATEWAY_DEVICE};

fn load_fixture(filename: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/fixtures");
    path.push(filename);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", filename, e))
}

fn gateway_reply(usn: &str, location: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         CACHE-CONTROL: max-age=120\r\n\
         ST: {}\r\n\
         USN: {}::{}\r\n\
         EXT:\r\n\
         SERVER: Linux/4.14 UPnP/1.1 MiniUPnPd/2.2\r\n\
         LOCATION: {}\r\n\r\n",
        INTERNET_GATEWAY_DEVICE, usn, INTERNET_GATEWAY_DEVICE, location
    )
}

/// Answer the first M-SEARCH with `replies`, returning the port to search
async fn responder(replies: Vec<String>) -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut buffer = vec![0u8; 8192];
        if let Ok((_, from)) = socket.recv_from(&mut buffer).await {
            for reply in replies {
                let _ = socket.send_to(reply.as_bytes(), from).await;
            }
        }
    });
    port
}

async fn control_point(port: u16) -> ControlPoint {
    ControlPoint::bind(SsdpConfig {
        multicast_addr: Ipv4Addr::LOCALHOST,
        port,
        mx: 1,
        ..SsdpConfig::search_only()
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_finds_nested_wanip_service() {
    let mut server = mockito::Server::new_async().await;
    let description = server
        .mock("GET", "/rootDesc.xml")
        .with_status(200)
        .with_body(load_fixture("miniupnpd_gateway.xml"))
        .expect(1)
        .create_async()
        .await;
    let external_ip = server
        .mock("POST", "/ctl/IPConn")
        .with_status(200)
        .with_body("<NewExternalIPAddress>203.0.113.50</NewExternalIPAddress>")
        .create_async()
        .await;

    let location = format!("{}/rootDesc.xml", server.url());
    let reply = gateway_reply("uuid:gw-1", &location);
    let port = responder(vec![reply.clone(), reply]).await;
    let control_point = control_point(port).await;

    let gateway =
        search_gateway_with(&control_point, &DescriptionClient::new(), Duration::from_secs(5))
            .await
            .unwrap();
    assert_eq!(gateway.host(), "127.0.0.1");
    assert_eq!(gateway.path(), "/ctl/IPConn");

    let ip = gateway.get_external_ip_address().await.unwrap();
    assert_eq!(ip.new_external_ip_address, "203.0.113.50");
    description.assert_async().await;
    external_ip.assert_async().await;
}

#[tokio::test]
async fn test_skips_gateway_without_wanip_service() {
    let mut server = mockito::Server::new_async().await;
    let _ppp = server
        .mock("GET", "/ppp.xml")
        .with_status(200)
        .with_body(load_fixture("wanppp_only_gateway.xml"))
        .create_async()
        .await;
    let _ip = server
        .mock("GET", "/ip.xml")
        .with_status(200)
        .with_body(load_fixture("miniupnpd_gateway.xml"))
        .create_async()
        .await;

    let port = responder(vec![
        gateway_reply("uuid:ppp", &format!("{}/ppp.xml", server.url())),
        gateway_reply("uuid:ip", &format!("{}/ip.xml", server.url())),
    ])
    .await;
    let control_point = control_point(port).await;

    let gateway =
        search_gateway_with(&control_point, &DescriptionClient::new(), Duration::from_secs(5))
            .await
            .unwrap();
    assert_eq!(gateway.path(), "/ctl/IPConn");
}

#[tokio::test]
async fn test_description_error_surfaces() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/rootDesc.xml")
        .with_status(500)
        .create_async()
        .await;

    let port = responder(vec![gateway_reply(
        "uuid:gw-1",
        &format!("{}/rootDesc.xml", server.url()),
    )])
    .await;
    let control_point = control_point(port).await;

    let result =
        search_gateway_with(&control_point, &DescriptionClient::new(), Duration::from_secs(5)).await;
    assert!(matches!(
        result,
        Err(IgdError::Discovery(DiscoveryError::UnexpectedHttpStatus(500)))
    ));
}

#[tokio::test]
async fn test_window_closes_without_gateway() {
    let port = responder(Vec::new()).await;
    let control_point = control_point(port).await;

    let result =
        search_gateway_with(&control_point, &DescriptionClient::new(), Duration::from_secs(5)).await;
    assert!(matches!(
        result,
        Err(IgdError::Discovery(DiscoveryError::SearchTimeout))
    ));
}
