//! SSDP control point.
//!
//! A [`ControlPoint`] listens for multicast advertisements on the SSDP port
//! for its whole lifetime and sends M-SEARCH requests on demand. Each search
//! gets its own ephemeral socket that collects unicast replies until the
//! search window (MX + 1 seconds) closes. Malformed or unrelated traffic is
//! dropped without surfacing an error.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, trace, warn};

use crate::config::{SsdpConfig, SSDP_ALL};
use crate::error::{DiscoveryError, Result};
use crate::httpu::{Headers, HttpuParser, MessageKind};

/// Pause after a failed receive on the advertisement socket
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(500);

/// Events emitted by a control point. Each carries the raw message headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsdpEvent {
    /// A device answered one of our searches
    DeviceFound(Headers),
    /// `NOTIFY` with `NTS: ssdp:alive`
    DeviceAvailable(Headers),
    /// `NOTIFY` with `NTS: ssdp:byebye`
    DeviceUnavailable(Headers),
    /// `NOTIFY` with `NTS: ssdp:update`
    DeviceUpdate(Headers),
}

impl SsdpEvent {
    pub fn headers(&self) -> &Headers {
        match self {
            SsdpEvent::DeviceFound(headers)
            | SsdpEvent::DeviceAvailable(headers)
            | SsdpEvent::DeviceUnavailable(headers)
            | SsdpEvent::DeviceUpdate(headers) => headers,
        }
    }
}

/// Parses datagrams and publishes the resulting events.
///
/// Shared by the advertisement listener and every search window.
#[derive(Debug)]
pub(crate) struct Dispatcher {
    request_parser: Mutex<Option<HttpuParser>>,
    response_parser: Mutex<Option<HttpuParser>>,
    events: broadcast::Sender<SsdpEvent>,
    closed: AtomicBool,
}

impl Dispatcher {
    pub(crate) fn new(event_buffer_size: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer_size);
        Self {
            request_parser: Mutex::new(Some(HttpuParser::new(MessageKind::Request))),
            response_parser: Mutex::new(Some(HttpuParser::new(MessageKind::Response))),
            events,
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SsdpEvent> {
        self.events.subscribe()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark closed and release both parsers
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.request_parser.lock().take();
        self.response_parser.lock().take();
    }

    /// Handle a datagram received on the advertisement socket.
    pub(crate) fn on_advertisement(&self, datagram: &[u8]) -> Option<SsdpEvent> {
        let message = {
            let mut guard = self.request_parser.lock();
            let parser = guard.as_mut()?;
            match parser.parse(datagram) {
                Ok(message) => message,
                Err(e) => {
                    trace!("Dropping advertisement datagram: {}", e);
                    return None;
                }
            }
        };
        if message.method() != Some("NOTIFY") {
            return None;
        }

        let headers = message.into_headers();
        debug!(
            "NOTIFY {} NT={} USN={}",
            headers.nts().unwrap_or("-"),
            headers.nt().unwrap_or("-"),
            headers.usn().unwrap_or("-")
        );
        let event = match headers.nts() {
            Some(nts) if nts.eq_ignore_ascii_case("ssdp:alive") => SsdpEvent::DeviceAvailable(headers),
            Some(nts) if nts.eq_ignore_ascii_case("ssdp:byebye") => {
                SsdpEvent::DeviceUnavailable(headers)
            }
            Some(nts) if nts.eq_ignore_ascii_case("ssdp:update") => SsdpEvent::DeviceUpdate(headers),
            _ => return None,
        };
        self.publish(event)
    }

    /// Handle a datagram received on a search socket.
    pub(crate) fn on_search_response(&self, datagram: &[u8]) -> Option<SsdpEvent> {
        let message = {
            let mut guard = self.response_parser.lock();
            let parser = guard.as_mut()?;
            match parser.parse(datagram) {
                Ok(message) => message,
                Err(e) => {
                    trace!("Dropping search response datagram: {}", e);
                    return None;
                }
            }
        };
        if message.status() != Some(200) {
            return None;
        }

        let headers = message.into_headers();
        if headers.st().is_none() || headers.usn().is_none() || headers.location().is_none() {
            trace!("Dropping search response without ST/USN/LOCATION");
            return None;
        }
        debug!(
            "RESPONSE ST={} USN={}",
            headers.st().unwrap_or_default(),
            headers.usn().unwrap_or_default()
        );
        self.publish(SsdpEvent::DeviceFound(headers))
    }

    fn publish(&self, event: SsdpEvent) -> Option<SsdpEvent> {
        if self.is_closed() {
            return None;
        }
        // Sending only fails when nobody is subscribed
        let _ = self.events.send(event.clone());
        Some(event)
    }
}

/// Handle to one search window.
///
/// Dropping the handle does not cancel the search; the window always runs
/// until its own deadline.
#[derive(Debug)]
pub struct SearchWindow {
    local_addr: SocketAddr,
    task: JoinHandle<usize>,
}

impl SearchWindow {
    /// Address of the ephemeral socket replies are sent to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the window to close, returning how many devices answered
    pub async fn finished(self) -> usize {
        self.task.await.unwrap_or(0)
    }
}

/// SSDP control point emitting [`SsdpEvent`]s.
///
/// # Example
///
/// ```no_run
/// use upnp_discovery::{ControlPoint, SsdpConfig, SsdpEvent};
///
/// # async fn run() -> upnp_discovery::Result<()> {
/// let control_point = ControlPoint::bind(SsdpConfig::default()).await?;
/// let mut events = control_point.subscribe();
///
/// control_point.search_all().await?;
/// while let Ok(event) = events.recv().await {
///     if let SsdpEvent::DeviceFound(headers) = event {
///         println!("{:?}", headers.location());
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ControlPoint {
    config: SsdpConfig,
    dispatcher: Arc<Dispatcher>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl ControlPoint {
    /// Create a control point, joining the multicast group unless
    /// advertisement listening is disabled in `config`.
    pub async fn bind(config: SsdpConfig) -> Result<Self> {
        config.validate()?;
        let dispatcher = Arc::new(Dispatcher::new(config.event_buffer_size));

        let listener = if config.listen_advertisements {
            let socket = bind_multicast(&config)?;
            info!(
                "SSDP control point listening on {}:{}",
                config.multicast_addr, config.port
            );
            Some(tokio::spawn(listen_advertisements(
                socket,
                Arc::clone(&dispatcher),
                config.max_datagram_size,
            )))
        } else {
            None
        };

        Ok(Self {
            config,
            dispatcher,
            listener: Mutex::new(listener),
        })
    }

    pub fn config(&self) -> &SsdpConfig {
        &self.config
    }

    /// Register an observer for discovery events
    pub fn subscribe(&self) -> broadcast::Receiver<SsdpEvent> {
        self.dispatcher.subscribe()
    }

    /// Search for every device and service (`ssdp:all`)
    pub async fn search_all(&self) -> Result<SearchWindow> {
        self.search(SSDP_ALL).await
    }

    /// Send one M-SEARCH for `search_target` and collect replies for MX + 1 seconds.
    ///
    /// Concurrent searches use separate sockets and do not interfere.
    /// Identical searches are not de-duplicated.
    pub async fn search(&self, search_target: &str) -> Result<SearchWindow> {
        if self.dispatcher.is_closed() {
            return Err(DiscoveryError::Closed);
        }

        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(|e| DiscoveryError::Network(format!("Failed to bind UDP socket: {}", e)))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| DiscoveryError::Network(format!("Failed to read local address: {}", e)))?;

        let request = msearch_request(&self.config, search_target);
        socket
            .send_to(request.as_bytes(), self.config.search_addr())
            .await
            .map_err(|e| DiscoveryError::Network(format!("Failed to send M-SEARCH: {}", e)))?;
        debug!("REQUEST SEARCH {}", search_target);

        let deadline = Instant::now() + self.config.search_window();
        let task = tokio::spawn(collect_responses(
            socket,
            Arc::clone(&self.dispatcher),
            deadline,
            self.config.max_datagram_size,
        ));
        Ok(SearchWindow { local_addr, task })
    }

    pub fn is_closed(&self) -> bool {
        self.dispatcher.is_closed()
    }

    /// Stop listening for advertisements and release the parsers.
    ///
    /// Searches already in flight run out their window but emit nothing.
    pub fn close(&self) {
        if self.dispatcher.is_closed() {
            return;
        }
        self.dispatcher.close();
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }
        debug!("SSDP control point closed");
    }
}

impl Drop for ControlPoint {
    fn drop(&mut self) {
        self.close();
    }
}

fn msearch_request(config: &SsdpConfig, search_target: &str) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}\r\n\
         ST: {}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         \r\n",
        config.search_addr(),
        search_target,
        config.mx
    )
}

/// Bind the SSDP port with address reuse and join the multicast group.
fn bind_multicast(config: &SsdpConfig) -> Result<UdpSocket> {
    let network = |context: &str, e: std::io::Error| {
        DiscoveryError::Network(format!("{}: {}", context, e))
    };

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| network("Failed to create UDP socket", e))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| network("Failed to set SO_REUSEADDR", e))?;
    let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port));
    socket
        .bind(&bind_addr.into())
        .map_err(|e| network("Failed to bind SSDP port", e))?;
    socket
        .join_multicast_v4(&config.multicast_addr, &config.interface)
        .map_err(|e| network("Failed to join multicast group", e))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| network("Failed to set non-blocking mode", e))?;

    UdpSocket::from_std(socket.into())
        .map_err(|e| network("Failed to register socket with runtime", e))
}

async fn listen_advertisements(socket: UdpSocket, dispatcher: Arc<Dispatcher>, buffer_size: usize) {
    let mut buffer = vec![0u8; buffer_size];
    loop {
        match socket.recv_from(&mut buffer).await {
            Ok((size, from)) => {
                if dispatcher.is_closed() {
                    break;
                }
                trace!("Advertisement datagram from {} ({} bytes)", from, size);
                dispatcher.on_advertisement(&buffer[..size]);
            }
            Err(e) => {
                if dispatcher.is_closed() {
                    break;
                }
                warn!(
                    "SSDP advertisement socket error, retrying in {:?}: {}",
                    RECV_ERROR_BACKOFF, e
                );
                tokio::time::sleep(RECV_ERROR_BACKOFF).await;
            }
        }
    }
}

async fn collect_responses(
    socket: UdpSocket,
    dispatcher: Arc<Dispatcher>,
    deadline: Instant,
    buffer_size: usize,
) -> usize {
    let mut buffer = vec![0u8; buffer_size];
    let mut found = 0;
    loop {
        match timeout_at(deadline, socket.recv_from(&mut buffer)).await {
            Err(_) => break,
            Ok(Ok((size, from))) => {
                if dispatcher.is_closed() {
                    continue;
                }
                trace!("Search response datagram from {} ({} bytes)", from, size);
                if dispatcher.on_search_response(&buffer[..size]).is_some() {
                    found += 1;
                }
            }
            Ok(Err(e)) => {
                // ICMP port unreachable and friends surface here on some platforms
                trace!("Search socket error: {}", e);
            }
        }
    }
    debug!("Search window closed with {} response(s)", found);
    found
}
