//! Relay, nodes and a control panel running together over loopback.

use greenhouse_node::{NodeClient, NodeClientState, NodeConfig};
use greenhouse_panel::{ControlPanelClient, PanelClientState, PanelConfig, PanelEvent};
use greenhouse_protocol::{
    ActuatorGroup, ActuatorState, LineListener, NodeDescriptor, SensorReading,
};
use greenhouse_relay::{Registry, RelayConfig, RelayServer, RelayStopHandle, Role};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct Greenhouse {
    addr: String,
    stop_relay: RelayStopHandle,
    relay_thread: Option<JoinHandle<()>>,
    registry: Arc<Registry>,
}

impl Greenhouse {
    fn start() -> Self {
        let server = RelayServer::bind(RelayConfig {
            bind_addr: "127.0.0.1".to_string(),
            port: 0,
            ..RelayConfig::default()
        })
        .unwrap();
        Greenhouse {
            addr: server.local_addr().to_string(),
            stop_relay: server.stop_handle(),
            registry: server.registry(),
            relay_thread: Some(thread::spawn(move || server.run())),
        }
    }

    fn node(&self, node_id: u32, actuators: Vec<ActuatorGroup>) -> (NodeClient, JoinHandle<()>) {
        let client = NodeClient::new(NodeConfig {
            reconnect_delay: Duration::from_millis(50),
            ..NodeConfig::new(self.addr.clone(), node_id, actuators)
        })
        .unwrap();
        let runner = client.clone();
        (client, thread::spawn(move || runner.run()))
    }

    fn panel(&self, delay: Duration) -> (ControlPanelClient, Receiver<PanelEvent>, JoinHandle<()>) {
        let (client, events) = ControlPanelClient::new(PanelConfig {
            announce_delay: delay,
            reconnect_delay: Duration::from_millis(50),
            ..PanelConfig::new(self.addr.clone())
        });
        let runner = client.clone();
        (client, events, thread::spawn(move || runner.run()))
    }

    fn wait_for_roles(&self, what: &str, pred: impl Fn(&[(u64, Role)]) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if pred(&self.registry.snapshot()) {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("relay never saw {}", what);
    }

    fn wait_for_nodes(&self, count: usize) {
        self.wait_for_roles("the nodes", |roles| {
            roles
                .iter()
                .filter(|(_, role)| matches!(role, Role::SensorActuator { node_id: Some(_) }))
                .count()
                == count
        });
    }

    fn wait_for_panel(&self) {
        self.wait_for_roles("a panel", |roles| {
            roles.iter().any(|(_, role)| *role == Role::ControlPanel)
        });
    }
}

fn wait_streaming(node: &NodeClient) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while node.state() != NodeClientState::Streaming {
        assert!(Instant::now() < deadline, "node {} never registered", node.node_id());
        thread::sleep(Duration::from_millis(10));
    }
}

impl Drop for Greenhouse {
    fn drop(&mut self) {
        self.stop_relay.stop();
        if let Some(handle) = self.relay_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Next event matching `pred`, skipping the rest
fn wait_event(events: &Receiver<PanelEvent>, pred: impl Fn(&PanelEvent) -> bool) -> PanelEvent {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(left) {
            Ok(event) if pred(&event) => return event,
            Ok(_) => continue,
            Err(e) => panic!("no matching panel event: {}", e),
        }
    }
}

#[test]
fn test_late_panel_learns_about_existing_node() {
    let greenhouse = Greenhouse::start();
    let (node, node_thread) = greenhouse.node(
        1,
        vec![ActuatorGroup::new(2, "window"), ActuatorGroup::new(1, "heater")],
    );
    greenhouse.wait_for_nodes(1);

    // Joins after the node registered; relies on the controlPanelAdded re-announce
    let (panel, events, panel_thread) = greenhouse.panel(Duration::ZERO);
    let added = wait_event(&events, |e| matches!(e, PanelEvent::NodeAdded(_)));
    let PanelEvent::NodeAdded(descriptor) = added else {
        unreachable!()
    };
    assert_eq!(
        descriptor,
        NodeDescriptor::from_groups(
            1,
            &[ActuatorGroup::new(2, "window"), ActuatorGroup::new(1, "heater")]
        )
    );

    // Toggle the heater (id 3) and wait for the node's confirmation
    assert!(panel.set_actuator(1, 3, true));
    let changed = wait_event(&events, |e| matches!(e, PanelEvent::ActuatorChanged(_)));
    assert_eq!(
        changed,
        PanelEvent::ActuatorChanged(ActuatorState {
            node_id: 1,
            actuator_id: 3,
            on: true
        })
    );
    assert_eq!(node.actuator_state(3), Some(true));
    assert_eq!(node.actuator_state(1), Some(false));

    node.stop();
    node_thread.join().unwrap();
    assert_eq!(
        wait_event(&events, |e| matches!(e, PanelEvent::NodeRemoved(_))),
        PanelEvent::NodeRemoved(1)
    );

    panel.stop();
    panel_thread.join().unwrap();
}

#[test]
fn test_command_reaches_only_the_named_node() {
    let greenhouse = Greenhouse::start();
    let fans = vec![ActuatorGroup::new(2, "fan")];
    let (node_a, thread_a) = greenhouse.node(10, fans.clone());
    let (node_b, thread_b) = greenhouse.node(20, fans);
    greenhouse.wait_for_nodes(2);

    let (panel, events, panel_thread) = greenhouse.panel(Duration::ZERO);
    wait_event(&events, |e| *e == PanelEvent::Connected);
    assert!(panel.set_actuator(20, 2, true));

    let changed = wait_event(&events, |e| matches!(e, PanelEvent::ActuatorChanged(_)));
    assert_eq!(
        changed,
        PanelEvent::ActuatorChanged(ActuatorState {
            node_id: 20,
            actuator_id: 2,
            on: true
        })
    );
    assert_eq!(node_b.actuator_state(2), Some(true));
    assert_eq!(node_a.actuator_state(2), Some(false));

    for (node, handle) in [(node_a, thread_a), (node_b, thread_b)] {
        node.stop();
        handle.join().unwrap();
    }
    panel.stop();
    panel_thread.join().unwrap();
}

#[test]
fn test_sensor_data_is_delivered_after_the_announce_delay() {
    let greenhouse = Greenhouse::start();
    let delay = Duration::from_millis(200);
    let (panel, events, panel_thread) = greenhouse.panel(delay);
    greenhouse.wait_for_panel();

    let (node, node_thread) = greenhouse.node(3, vec![ActuatorGroup::new(1, "heater")]);
    wait_streaming(&node);

    let pushed_at = Instant::now();
    let readings = vec![
        SensorReading::new("temperature", 21.5, "°C"),
        SensorReading::new("humidity", 55.0, "%"),
    ];
    assert!(node.push_sensor_data(readings.clone()));

    let event = wait_event(&events, |e| matches!(e, PanelEvent::SensorData { .. }));
    assert!(pushed_at.elapsed() >= delay);
    assert_eq!(event, PanelEvent::SensorData { node_id: 3, readings });

    node.stop();
    node_thread.join().unwrap();
    panel.stop();
    panel_thread.join().unwrap();
}

#[test]
fn test_panel_reconnects_and_registers_again() {
    let listener = LineListener::bind("127.0.0.1:0").unwrap();
    let (panel, events) = ControlPanelClient::new(PanelConfig {
        announce_delay: Duration::ZERO,
        reconnect_delay: Duration::from_millis(50),
        ..PanelConfig::new(listener.local_addr().to_string())
    });
    let runner = panel.clone();
    let panel_thread = thread::spawn(move || runner.run());

    for _ in 0..2 {
        let mut relay = listener.accept().unwrap();
        relay.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(relay.recv_line().unwrap(), "setNodeType-ControlPanel");
        assert_eq!(relay.recv_line().unwrap(), "controlPanelAdded-");
        assert_eq!(wait_event(&events, |_| true), PanelEvent::Connected);
        drop(relay);
        assert_eq!(wait_event(&events, |_| true), PanelEvent::Disconnected);
    }

    panel.stop();
    panel_thread.join().unwrap();
    assert_eq!(panel.state(), PanelClientState::Stopped);
}
