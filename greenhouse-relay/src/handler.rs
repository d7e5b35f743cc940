//! Per-connection command processing.

use crate::link::{PeerLink, TcpPeerLink};
use crate::registry::{ConnectionId, Registry, Role};
use crate::preview;
use greenhouse_protocol::{LineConnection, LineReader, Message, NodeId, NodeKind, ProtocolError};
use std::sync::Arc;
use std::time::Duration;

/// Where a connection is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    Unregistered,
    Registered(Role),
    Terminated,
}

/// Command state machine of one connection, independent of its socket.
///
/// Every line is decoded and dispatched on its own; a line that does not decode
/// is logged and dropped without affecting the state.
pub struct Session {
    id: ConnectionId,
    registry: Arc<Registry>,
    state: HandlerState,
    // setId normally arrives before setNodeType
    announced_id: Option<NodeId>,
}

impl Session {
    pub fn new(id: ConnectionId, registry: Arc<Registry>) -> Self {
        Session {
            id,
            registry,
            state: HandlerState::Unregistered,
            announced_id: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> HandlerState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == HandlerState::Terminated
    }

    /// Process one inbound line
    pub fn handle_line(&mut self, line: &str) {
        if self.is_terminated() {
            return;
        }

        let msg = match Message::decode(line) {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("[conn {}] dropping '{}': {}", self.id, preview(line), e);
                return;
            }
        };
        log::trace!("[conn {}] <- {}", self.id, preview(line));

        match msg {
            Message::SetNodeType(kind) => self.assign_kind(kind),
            Message::SetId(node_id) => self.assign_node_id(node_id),
            Message::NodeAdded(_)
            | Message::UpdateSensorData { .. }
            | Message::ActuatorUpdated(_)
            | Message::SendCameraImage(_) => {
                self.registry.route_to_role(NodeKind::ControlPanel, line);
            }
            Message::ControlPanelAdded => {
                self.registry.route_to_role(NodeKind::SensorActuator, line);
            }
            Message::ControlPanelUpdateActuator(command) => {
                if self.registry.route_to_node(command.node_id, line) == 0 {
                    log::debug!(
                        "[conn {}] no live node {}, command dropped",
                        self.id,
                        command.node_id
                    );
                }
            }
            Message::NodeRemoved(node_id) => {
                self.registry.route_to_role(NodeKind::ControlPanel, line);
                log::info!("[conn {}] node {} removed itself", self.id, node_id);
                self.state = HandlerState::Terminated;
            }
            Message::CheckConnection | Message::GetCameraImage(_) => {}
        }
    }

    fn assign_kind(&mut self, kind: NodeKind) {
        let role = match kind {
            NodeKind::ControlPanel => Role::ControlPanel,
            NodeKind::SensorActuator => Role::SensorActuator {
                node_id: self.announced_id,
            },
        };
        self.set_role(role);
    }

    fn assign_node_id(&mut self, node_id: NodeId) {
        match self.state {
            HandlerState::Registered(Role::ControlPanel) => {
                log::warn!(
                    "[conn {}] ignoring setId-{} from a control panel",
                    self.id,
                    node_id
                );
            }
            HandlerState::Registered(Role::SensorActuator { .. }) => {
                self.announced_id = Some(node_id);
                self.set_role(Role::SensorActuator {
                    node_id: Some(node_id),
                });
            }
            _ => self.announced_id = Some(node_id),
        }
    }

    fn set_role(&mut self, role: Role) {
        self.registry.set_role(self.id, role);
        self.state = HandlerState::Registered(role);
        log::info!("[conn {}] registered as {:?}", self.id, role);
    }
}

/// Owns one accepted socket: reads lines, feeds them to the session and
/// removes the connection from the registry when it ends.
pub struct ConnectionHandler {
    reader: LineReader,
    link: Arc<TcpPeerLink>,
    session: Session,
}

impl ConnectionHandler {
    /// Wrap an accepted connection and register it with role `Unset`
    pub fn new(
        id: ConnectionId,
        conn: LineConnection,
        registry: Arc<Registry>,
        write_timeout: Option<Duration>,
    ) -> Result<Self, std::io::Error> {
        let peer = conn.peer_addr();
        let closer = conn.closer()?;
        let (reader, writer) = conn.split();
        writer.set_write_timeout(write_timeout)?;

        let link = Arc::new(TcpPeerLink::new(writer, closer, peer));
        registry.register(id, link.clone());

        Ok(ConnectionHandler {
            reader,
            link,
            session: Session::new(id, registry),
        })
    }

    /// Write one line to this handler's peer
    pub fn send_to_client(&self, line: &str) {
        self.link.send_line(line);
    }

    /// Read loop. Returns when the peer disconnects, the socket fails or the
    /// peer sends `nodeRemoved`.
    pub fn run(mut self) {
        let id = self.session.id();
        log::info!("[conn {}] connected from {}", id, self.link.peer());

        while !self.session.is_terminated() {
            match self.reader.recv_line() {
                Ok(line) => self.session.handle_line(&line),
                Err(e) if e.is_recoverable() => {
                    log::warn!("[conn {}] {}", id, e);
                }
                Err(ProtocolError::ConnectionClosed) => {
                    log::debug!("[conn {}] peer closed the connection", id);
                    break;
                }
                Err(e) => {
                    log::warn!("[conn {}] read failed: {}", id, e);
                    break;
                }
            }
        }
        // Drop closes the socket and deregisters
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        let id = self.session.id();
        self.link.close();
        self.session.registry.deregister(id);
        log::info!("[conn {}] disconnected ({})", id, self.link.peer());
    }
}
