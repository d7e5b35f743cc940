//! Node side of the relay protocol.
//!
//! A node registers itself with `setId`, `setNodeType` and `nodeAdded` on every
//! connection, then streams sensor readings and actuator changes to the relay
//! while applying the actuator commands control panels send it. Connection
//! loss is never fatal; the client reconnects until it is stopped.

use crate::actuators::ActuatorBank;
use greenhouse_protocol::{
    ActuatorGroup, ActuatorId, ActuatorState, CameraImage, ConnectionCloser, LineConnection,
    LineReader, LineWriter, Message, NodeDescriptor, NodeId, NodeKind, ProtocolError,
    SensorReading, StopSignal,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Pause between reconnection attempts
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Give up on a single connection attempt after this long
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Node client settings
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Relay address as `host:port`
    pub relay_addr: String,
    pub node_id: NodeId,
    pub actuators: Vec<ActuatorGroup>,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
}

impl NodeConfig {
    pub fn new(relay_addr: impl Into<String>, node_id: NodeId, actuators: Vec<ActuatorGroup>) -> Self {
        NodeConfig {
            relay_addr: relay_addr.into(),
            node_id,
            actuators,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeClientState {
    Disconnected,
    Connecting,
    /// Registration lines sent
    Registered,
    /// Reading commands from the relay
    Streaming,
    /// Stopped for good, no further reconnects
    Stopped,
}

/// Write half of the current relay connection
struct Link {
    writer: LineWriter,
    closer: ConnectionCloser,
}

struct Shared {
    config: NodeConfig,
    actuators: Mutex<ActuatorBank>,
    // Single writer lock; every outbound line goes through it
    link: Mutex<Option<Link>>,
    state: Mutex<NodeClientState>,
    stop: StopSignal,
}

/// Handle to a node's relay connection. Clones share the same connection, so
/// a sensor thread and the receive loop can both hold one.
#[derive(Clone)]
pub struct NodeClient {
    shared: Arc<Shared>,
}

impl NodeClient {
    /// Fails if the actuator inventory is too large to advertise
    pub fn new(config: NodeConfig) -> Result<Self, ProtocolError> {
        let actuators = ActuatorBank::new(config.node_id, &config.actuators)?;
        Ok(NodeClient {
            shared: Arc::new(Shared {
                config,
                actuators: Mutex::new(actuators),
                link: Mutex::new(None),
                state: Mutex::new(NodeClientState::Disconnected),
                stop: StopSignal::new(),
            }),
        })
    }

    pub fn node_id(&self) -> NodeId {
        self.shared.config.node_id
    }

    pub fn state(&self) -> NodeClientState {
        *lock(&self.shared.state)
    }

    pub fn descriptor(&self) -> NodeDescriptor {
        lock(&self.shared.actuators).descriptor().clone()
    }

    pub fn actuator_state(&self, id: ActuatorId) -> Option<bool> {
        lock(&self.shared.actuators).is_on(id)
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stop.is_stopped()
    }

    /// Sleep up to `timeout`, returning early (with true) once stopped
    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        self.shared.stop.wait(timeout)
    }

    /// Connect, register and serve relay commands until [`NodeClient::stop`]
    /// is called. Blocks the calling thread.
    pub fn run(&self) {
        let id = self.node_id();
        let config = &self.shared.config;

        while !self.is_stopped() {
            self.set_state(NodeClientState::Connecting);
            log::debug!("Node {}: connecting to relay at {}", id, config.relay_addr);

            match self.connect() {
                Ok(reader) => {
                    log::info!("Node {}: registered with relay at {}", id, config.relay_addr);
                    self.set_state(NodeClientState::Streaming);
                    self.receive_loop(reader);
                    self.detach();
                    if self.is_stopped() {
                        break;
                    }
                    log::warn!(
                        "Node {}: lost relay connection, reconnecting in {:?}",
                        id,
                        config.reconnect_delay
                    );
                }
                Err(e) => {
                    log::warn!(
                        "Node {}: cannot reach relay at {}: {} (retrying in {:?})",
                        id,
                        config.relay_addr,
                        e,
                        config.reconnect_delay
                    );
                }
            }

            self.set_state(NodeClientState::Disconnected);
            if self.shared.stop.wait(config.reconnect_delay) {
                break;
            }
        }

        self.set_state(NodeClientState::Stopped);
        log::info!("Node {}: stopped", id);
    }

    /// Send `nodeRemoved`, close the connection and stop reconnecting
    pub fn stop(&self) {
        self.shared.stop.stop();
        let link = lock(&self.shared.link).take();
        if let Some(mut link) = link {
            let msg = Message::NodeRemoved(self.node_id());
            match link.writer.send(&msg) {
                Ok(()) => log::trace!("Node {}: -> {}", self.node_id(), msg),
                Err(e) => log::debug!("Node {}: could not announce removal: {}", self.node_id(), e),
            }
            link.closer.close();
        }
        self.set_state(NodeClientState::Stopped);
    }

    /// Close the current connection; `run` reconnects after the usual delay
    pub fn drop_connection(&self) {
        if let Some(link) = lock(&self.shared.link).as_ref() {
            link.closer.close();
        }
    }

    /// Push a batch of readings as one `updateSensorData` line.
    /// Returns false if there is no relay connection to send it on.
    pub fn push_sensor_data(&self, readings: Vec<SensorReading>) -> bool {
        self.send(&Message::UpdateSensorData {
            node_id: self.node_id(),
            readings,
        })
    }

    /// Change an actuator locally and report it. Returns false for an unknown id.
    pub fn set_actuator(&self, id: ActuatorId, on: bool) -> bool {
        // Echoes are sent under the bank lock so they leave in the order the
        // changes were made. Lock order is always actuators, then link.
        let mut bank = lock(&self.shared.actuators);
        let applied = bank.set(id, on);
        self.report_actuator(id, applied)
    }

    pub fn toggle_actuator(&self, id: ActuatorId) -> bool {
        let mut bank = lock(&self.shared.actuators);
        let applied = bank.toggle(id);
        self.report_actuator(id, applied)
    }

    /// Forward an already base64 encoded image to the control panels
    pub fn send_camera_image(&self, data: impl Into<String>) -> bool {
        self.send(&Message::SendCameraImage(CameraImage {
            node_id: self.node_id(),
            data: data.into(),
        }))
    }

    fn report_actuator(&self, id: ActuatorId, applied: Option<bool>) -> bool {
        let Some(on) = applied else {
            log::warn!("Node {}: no actuator with id {}", self.node_id(), id);
            return false;
        };
        log::debug!("Node {}: actuator {} is now {}", self.node_id(), id, on_off(on));
        self.send(&Message::ActuatorUpdated(ActuatorState {
            node_id: self.node_id(),
            actuator_id: id,
            on,
        }));
        true
    }

    fn node_added(&self) -> Message {
        Message::NodeAdded(self.descriptor())
    }

    fn set_state(&self, state: NodeClientState) {
        let mut current = lock(&self.shared.state);
        if *current != NodeClientState::Stopped {
            *current = state;
        }
    }

    fn connect(&self) -> Result<LineReader, ProtocolError> {
        let config = &self.shared.config;
        let conn = LineConnection::connect_timeout(&config.relay_addr, config.connect_timeout)?;
        let closer = conn.closer()?;
        let (reader, mut writer) = conn.split();
        let registration = [
            Message::SetId(config.node_id),
            Message::SetNodeType(NodeKind::SensorActuator),
            self.node_added(),
        ];

        // Holding the link lock keeps pushes from other threads out until the
        // registration lines are on the wire
        let mut link = lock(&self.shared.link);
        for msg in &registration {
            writer.send(msg)?;
            log::trace!("Node {}: -> {}", config.node_id, msg);
        }
        if self.is_stopped() {
            closer.close();
            return Err(ProtocolError::ConnectionClosed);
        }
        *link = Some(Link { writer, closer });
        drop(link);

        self.set_state(NodeClientState::Registered);
        Ok(reader)
    }

    fn detach(&self) {
        if let Some(link) = lock(&self.shared.link).take() {
            link.closer.close();
        }
    }

    fn receive_loop(&self, mut reader: LineReader) {
        let id = self.node_id();
        loop {
            match reader.recv_line() {
                Ok(line) => self.handle_line(&line),
                Err(e) if e.is_recoverable() => log::warn!("Node {}: {}", id, e),
                Err(ProtocolError::ConnectionClosed) => {
                    log::debug!("Node {}: relay closed the connection", id);
                    break;
                }
                Err(e) => {
                    log::warn!("Node {}: read failed: {}", id, e);
                    break;
                }
            }
        }
    }

    fn handle_line(&self, line: &str) {
        let id = self.node_id();
        let msg = match Message::decode(line) {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("Node {}: ignoring '{}': {}", id, line, e);
                return;
            }
        };
        log::trace!("Node {}: <- {}", id, line);

        match msg {
            Message::ControlPanelUpdateActuator(command) => {
                if command.node_id != id {
                    log::debug!("Node {}: command for node {} ignored", id, command.node_id);
                    return;
                }
                self.set_actuator(command.actuator_id, command.on);
            }
            Message::ControlPanelAdded => {
                log::debug!("Node {}: control panel joined, re-announcing", id);
                self.send(&self.node_added());
            }
            other => log::debug!("Node {}: unexpected {} from relay", id, other.verb()),
        }
    }

    fn send(&self, msg: &Message) -> bool {
        let mut link = lock(&self.shared.link);
        let Some(active) = link.as_mut() else {
            log::debug!("Node {}: not connected, dropping {}", self.node_id(), msg.verb());
            return false;
        };
        match active.writer.send(msg) {
            Ok(()) => {
                log::trace!("Node {}: -> {}", self.node_id(), msg);
                true
            }
            Err(e) => {
                log::warn!("Node {}: write failed: {}", self.node_id(), e);
                // Let the receive loop notice and reconnect
                active.closer.close();
                false
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
