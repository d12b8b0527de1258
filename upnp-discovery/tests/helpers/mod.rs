//! Test helpers for fixture-based integration tests

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// A device description served from the fixtures directory
#[derive(Debug, Clone)]
pub struct DescriptionFixture {
    pub name: String,
    pub xml_content: String,
}

impl DescriptionFixture {
    /// Load a fixture from the fixtures directory
    pub fn load(filename: &str) -> Self {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push("tests/fixtures");
        path.push(filename);

        let xml_content = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", filename, e));

        Self {
            name: filename.to_string(),
            xml_content,
        }
    }
}

/// Search response a device would send for `st`
pub fn ssdp_response(st: &str, usn: &str, location: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         CACHE-CONTROL: max-age=120\r\n\
         ST: {}\r\n\
         USN: {}\r\n\
         EXT:\r\n\
         SERVER: OpenWRT/18.06 UPnP/1.1 MiniUPnPd/2.1\r\n\
         LOCATION: {}\r\n\r\n",
        st, usn, location
    )
}

/// Loopback UDP socket standing in for the SSDP multicast group.
///
/// Every M-SEARCH it receives is recorded and answered with `replies`,
/// sent back to the searching socket.
pub struct FakeResponder {
    pub port: u16,
    task: JoinHandle<Vec<String>>,
}

impl FakeResponder {
    pub async fn start(replies: Vec<String>) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();

        let task = tokio::spawn(async move {
            let mut requests = Vec::new();
            let mut buffer = vec![0u8; 8192];
            while let Ok(Ok((size, from))) =
                tokio::time::timeout(Duration::from_secs(1), socket.recv_from(&mut buffer)).await
            {
                requests.push(String::from_utf8_lossy(&buffer[..size]).into_owned());
                for reply in &replies {
                    socket.send_to(reply.as_bytes(), from).await.unwrap();
                }
            }
            requests
        });

        Self { port, task }
    }

    /// Requests received before the responder went idle
    pub async fn requests(self) -> Vec<String> {
        self.task.await.unwrap()
    }
}
