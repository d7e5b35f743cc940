//! Relay TCP server: accept loop and the shared registry.

use crate::handler::ConnectionHandler;
use crate::registry::{ConnectionId, Registry};
use crate::DEFAULT_PORT;
use greenhouse_protocol::{LineConnection, LineListener, NodeId, NodeKind, StopSignal};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

/// Address the relay listens on by default
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Relay settings
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Bounds how long one slow peer can stall a broadcast
    pub write_timeout: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            bind_addr: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            write_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl RelayConfig {
    pub fn address(&self) -> String {
        if self.bind_addr.contains(':') {
            format!("[{}]:{}", self.bind_addr, self.port)
        } else {
            format!("{}:{}", self.bind_addr, self.port)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Relay server that routes lines between nodes and control panels
pub struct RelayServer {
    listener: LineListener,
    registry: Arc<Registry>,
    stop: StopSignal,
    config: RelayConfig,
}

impl RelayServer {
    /// Bind the listening socket. Failure here is fatal for the relay.
    pub fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let addr = config.address();
        let listener = LineListener::bind(&addr).map_err(|source| RelayError::Bind {
            addr: addr.clone(),
            source,
        })?;
        Ok(RelayServer {
            listener,
            registry: Arc::new(Registry::new()),
            stop: StopSignal::new(),
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Handle that stops the accept loop from another thread
    pub fn stop_handle(&self) -> RelayStopHandle {
        RelayStopHandle {
            stop: self.stop.clone(),
            addr: self.local_addr(),
        }
    }

    /// Deliver `line` to every connection of the given role
    pub fn route_to_role(&self, kind: NodeKind, line: &str) -> usize {
        self.registry.route_to_role(kind, line)
    }

    /// Deliver `line` to the node with the given id, if it is connected
    pub fn route_to_node(&self, node_id: NodeId, line: &str) -> usize {
        self.registry.route_to_node(node_id, line)
    }

    pub fn deregister(&self, id: ConnectionId) -> bool {
        self.registry.deregister(id)
    }

    /// Run the accept loop until stopped. The listening socket is closed on
    /// return; connections already accepted keep running.
    pub fn run(self) {
        log::info!("Relay listening on {}", self.local_addr());

        let mut next_id: ConnectionId = 1;
        while !self.stop.is_stopped() {
            match self.listener.accept() {
                Ok(conn) => {
                    if self.stop.is_stopped() {
                        // Wake-up connection from stop()
                        break;
                    }
                    let id = next_id;
                    next_id += 1;
                    self.spawn_handler(id, conn);
                }
                Err(e) => {
                    log::warn!("Accept error: {}", e);
                    // Back off so a persistent error (e.g. out of fds) does not spin
                    self.stop.wait(Duration::from_millis(100));
                }
            }
        }

        log::info!("Relay stopped accepting connections");
    }

    fn spawn_handler(&self, id: ConnectionId, conn: LineConnection) {
        let peer = conn.peer_addr();
        let handler =
            match ConnectionHandler::new(id, conn, self.registry.clone(), self.config.write_timeout) {
                Ok(handler) => handler,
                Err(e) => {
                    log::warn!("Could not set up connection from {}: {}", peer, e);
                    return;
                }
            };

        // A failed spawn drops the handler, which deregisters it
        if let Err(e) = std::thread::Builder::new()
            .name(format!("relay-conn-{}", id))
            .spawn(move || handler.run())
        {
            log::error!("Could not spawn handler thread for {}: {}", peer, e);
        }
    }
}

/// Stops a running [`RelayServer`]
#[derive(Clone)]
pub struct RelayStopHandle {
    stop: StopSignal,
    addr: SocketAddr,
}

impl RelayStopHandle {
    /// Stop accepting connections. Open connections are left alone.
    pub fn stop(&self) {
        self.stop.stop();

        // accept() has no timeout; poke it with a local connection
        let ip = match self.addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };
        let wake = SocketAddr::new(ip, self.addr.port());
        if let Err(e) = TcpStream::connect_timeout(&wake, Duration::from_secs(1)) {
            log::debug!("Wake-up connection to {} failed: {}", wake, e);
        }
    }
}
