//! Control panel side of the relay protocol.

use crate::events::{EventDispatcher, PanelEvent};
use greenhouse_protocol::{
    ActuatorId, ActuatorState, ConnectionCloser, LineConnection, LineReader, LineWriter, Message,
    NodeId, NodeKind, ProtocolError, StopSignal,
};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Delay before node announcements and sensor data are passed on
pub const DEFAULT_ANNOUNCE_DELAY: Duration = Duration::from_secs(1);

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Control panel client settings
#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// Relay address as `host:port`
    pub relay_addr: String,
    /// Applied to `NodeAdded` and `SensorData` events; zero delivers at once
    pub announce_delay: Duration,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
}

impl PanelConfig {
    pub fn new(relay_addr: impl Into<String>) -> Self {
        PanelConfig {
            relay_addr: relay_addr.into(),
            announce_delay: DEFAULT_ANNOUNCE_DELAY,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelClientState {
    Disconnected,
    Connecting,
    Registered,
    Stopped,
}

struct Link {
    writer: LineWriter,
    closer: ConnectionCloser,
}

struct Shared {
    config: PanelConfig,
    link: Mutex<Option<Link>>,
    state: Mutex<PanelClientState>,
    stop: StopSignal,
    events: EventDispatcher,
}

/// Handle to a control panel's relay connection.
///
/// Everything the panel learns arrives as [`PanelEvent`]s on the receiver
/// returned by [`ControlPanelClient::new`].
#[derive(Clone)]
pub struct ControlPanelClient {
    shared: Arc<Shared>,
}

impl ControlPanelClient {
    pub fn new(config: PanelConfig) -> (Self, Receiver<PanelEvent>) {
        let stop = StopSignal::new();
        let (events, receiver) = EventDispatcher::new(config.announce_delay, stop.clone());
        let client = ControlPanelClient {
            shared: Arc::new(Shared {
                config,
                link: Mutex::new(None),
                state: Mutex::new(PanelClientState::Disconnected),
                stop,
                events,
            }),
        };
        (client, receiver)
    }

    pub fn state(&self) -> PanelClientState {
        *lock(&self.shared.state)
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stop.is_stopped()
    }

    /// Connect, register and deliver events until [`ControlPanelClient::stop`]
    /// is called. Blocks the calling thread.
    pub fn run(&self) {
        let config = &self.shared.config;

        while !self.is_stopped() {
            self.set_state(PanelClientState::Connecting);
            log::debug!("Panel: connecting to relay at {}", config.relay_addr);

            match self.connect() {
                Ok(reader) => {
                    log::info!("Panel: registered with relay at {}", config.relay_addr);
                    self.shared.events.emit(PanelEvent::Connected);
                    self.receive_loop(reader);
                    self.detach();
                    self.shared.events.emit(PanelEvent::Disconnected);
                    if self.is_stopped() {
                        break;
                    }
                    log::warn!(
                        "Panel: lost relay connection, reconnecting in {:?}",
                        config.reconnect_delay
                    );
                }
                Err(e) => {
                    log::warn!(
                        "Panel: cannot reach relay at {}: {} (retrying in {:?})",
                        config.relay_addr,
                        e,
                        config.reconnect_delay
                    );
                }
            }

            self.set_state(PanelClientState::Disconnected);
            if self.shared.stop.wait(config.reconnect_delay) {
                break;
            }
        }

        self.set_state(PanelClientState::Stopped);
        log::info!("Panel: stopped");
    }

    /// Close the connection and stop reconnecting
    pub fn stop(&self) {
        self.shared.stop.stop();
        self.detach();
        self.set_state(PanelClientState::Stopped);
    }

    /// Ask a node to switch one of its actuators. The relay routes the command
    /// to that node only; the node confirms with an `ActuatorChanged` event.
    /// Returns false if there is no relay connection.
    pub fn set_actuator(&self, node_id: NodeId, actuator_id: ActuatorId, on: bool) -> bool {
        self.send(&Message::ControlPanelUpdateActuator(ActuatorState {
            node_id,
            actuator_id,
            on,
        }))
    }

    fn set_state(&self, state: PanelClientState) {
        let mut current = lock(&self.shared.state);
        if *current != PanelClientState::Stopped {
            *current = state;
        }
    }

    fn connect(&self) -> Result<LineReader, ProtocolError> {
        let config = &self.shared.config;
        let conn = LineConnection::connect_timeout(&config.relay_addr, config.connect_timeout)?;
        let closer = conn.closer()?;
        let (reader, mut writer) = conn.split();

        let mut link = lock(&self.shared.link);
        for msg in [Message::SetNodeType(NodeKind::ControlPanel), Message::ControlPanelAdded] {
            writer.send(&msg)?;
            log::trace!("Panel: -> {}", msg);
        }
        if self.is_stopped() {
            closer.close();
            return Err(ProtocolError::ConnectionClosed);
        }
        *link = Some(Link { writer, closer });
        drop(link);

        self.set_state(PanelClientState::Registered);
        Ok(reader)
    }

    fn detach(&self) {
        if let Some(link) = lock(&self.shared.link).take() {
            link.closer.close();
        }
    }

    fn receive_loop(&self, mut reader: LineReader) {
        loop {
            match reader.recv_line() {
                Ok(line) => self.handle_line(&line),
                Err(e) if e.is_recoverable() => log::warn!("Panel: {}", e),
                Err(ProtocolError::ConnectionClosed) => {
                    log::debug!("Panel: relay closed the connection");
                    break;
                }
                Err(e) => {
                    log::warn!("Panel: read failed: {}", e);
                    break;
                }
            }
        }
    }

    fn handle_line(&self, line: &str) {
        let msg = match Message::decode(line) {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("Panel: ignoring '{}': {}", line, e);
                return;
            }
        };
        log::trace!("Panel: <- {}", msg.verb());

        let events = &self.shared.events;
        match msg {
            Message::NodeAdded(descriptor) => {
                log::info!(
                    "Panel: node {} has {} actuator(s)",
                    descriptor.node_id,
                    descriptor.actuators.len()
                );
                events.emit_delayed(PanelEvent::NodeAdded(descriptor));
            }
            Message::UpdateSensorData { node_id, readings } => {
                events.emit_delayed(PanelEvent::SensorData { node_id, readings });
            }
            Message::ActuatorUpdated(state) => events.emit(PanelEvent::ActuatorChanged(state)),
            Message::NodeRemoved(node_id) => {
                log::info!("Panel: node {} removed", node_id);
                events.emit(PanelEvent::NodeRemoved(node_id));
            }
            Message::SendCameraImage(image) => events.emit(PanelEvent::CameraImage(image)),
            other => log::debug!("Panel: unexpected {} from relay", other.verb()),
        }
    }

    fn send(&self, msg: &Message) -> bool {
        let mut link = lock(&self.shared.link);
        let Some(active) = link.as_mut() else {
            log::warn!("Panel: not connected, dropping {}", msg.verb());
            return false;
        };
        match active.writer.send(msg) {
            Ok(()) => {
                log::trace!("Panel: -> {}", msg);
                true
            }
            Err(e) => {
                log::warn!("Panel: write failed: {}", e);
                active.closer.close();
                false
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenhouse_protocol::{ActuatorGroup, LineListener, NodeDescriptor};
    use std::thread;

    fn config(addr: String) -> PanelConfig {
        PanelConfig {
            announce_delay: Duration::ZERO,
            reconnect_delay: Duration::from_millis(50),
            ..PanelConfig::new(addr)
        }
    }

    fn next(events: &Receiver<PanelEvent>) -> PanelEvent {
        events.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_registers_and_translates_lines() {
        let listener = LineListener::bind("127.0.0.1:0").unwrap();
        let (client, events) = ControlPanelClient::new(config(listener.local_addr().to_string()));
        let runner = client.clone();
        let run_thread = thread::spawn(move || runner.run());

        let mut relay = listener.accept().unwrap();
        relay.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(relay.recv_line().unwrap(), "setNodeType-ControlPanel");
        assert_eq!(relay.recv_line().unwrap(), "controlPanelAdded-");
        assert_eq!(next(&events), PanelEvent::Connected);

        relay.send_line("nodeAdded-4;1_fan").unwrap();
        relay.send_line("nonsense").unwrap();
        relay.send_line("actuatorUpdated-4;1=true").unwrap();
        relay.send_line("nodeRemoved-4").unwrap();

        assert_eq!(
            next(&events),
            PanelEvent::NodeAdded(NodeDescriptor::from_groups(4, &[ActuatorGroup::new(1, "fan")]))
        );
        assert_eq!(
            next(&events),
            PanelEvent::ActuatorChanged(ActuatorState {
                node_id: 4,
                actuator_id: 1,
                on: true
            })
        );
        assert_eq!(next(&events), PanelEvent::NodeRemoved(4));

        assert!(client.set_actuator(4, 1, false));
        assert_eq!(relay.recv_line().unwrap(), "controlPanelUpdateActuator-4;1=false");

        client.stop();
        run_thread.join().unwrap();
        assert_eq!(next(&events), PanelEvent::Disconnected);
        assert_eq!(client.state(), PanelClientState::Stopped);
    }

    #[test]
    fn test_set_actuator_without_connection() {
        let (client, _events) = ControlPanelClient::new(config("127.0.0.1:1".to_string()));
        assert!(!client.set_actuator(1, 1, true));
    }
}
