//! The reference greenhouse in one process: a relay, two nodes and a
//! headless control panel that logs what it sees.

use crate::console::{self, ConsoleCommand};
use crate::parse_args::SimulateArgs;
use anyhow::Context;
use greenhouse_node::{
    spawn_sensor_ticker, NodeClient, NodeConfig, RandomWalkSensor, SensorSource,
    DEFAULT_SENSING_INTERVAL,
};
use greenhouse_panel::{ControlPanelClient, PanelConfig};
use greenhouse_protocol::{ActuatorGroup, NodeId};
use greenhouse_relay::{RelayConfig, RelayServer};
use std::thread::{self, JoinHandle};

/// Sensor and actuator counts of one simulated node
struct NodeLayout {
    node_id: NodeId,
    temperature: usize,
    humidity: usize,
    windows: u32,
    fans: u32,
    heaters: u32,
}

impl NodeLayout {
    fn actuators(&self) -> Vec<ActuatorGroup> {
        vec![
            ActuatorGroup::new(self.windows, "window"),
            ActuatorGroup::new(self.fans, "fan"),
            ActuatorGroup::new(self.heaters, "heater"),
        ]
    }

    fn sensors(&self) -> Vec<Box<dyn SensorSource>> {
        let mut sensors: Vec<Box<dyn SensorSource>> = Vec::new();
        for _ in 0..self.temperature {
            sensors.push(Box::new(RandomWalkSensor::temperature()));
        }
        for _ in 0..self.humidity {
            sensors.push(Box::new(RandomWalkSensor::humidity()));
        }
        sensors
    }
}

const GREENHOUSE: [NodeLayout; 2] = [
    NodeLayout {
        node_id: 1,
        temperature: 2,
        humidity: 1,
        windows: 3,
        fans: 2,
        heaters: 1,
    },
    NodeLayout {
        node_id: 2,
        temperature: 1,
        humidity: 2,
        windows: 3,
        fans: 2,
        heaters: 1,
    },
];

struct RunningNode {
    client: NodeClient,
    threads: Vec<JoinHandle<()>>,
}

pub fn run(args: SimulateArgs) -> anyhow::Result<()> {
    let server = RelayServer::bind(RelayConfig {
        bind_addr: "127.0.0.1".to_string(),
        port: args.port,
        ..RelayConfig::default()
    })?;
    let relay_addr = server.local_addr().to_string();
    let stop_relay = server.stop_handle();
    let relay_thread = thread::Builder::new()
        .name("relay".to_string())
        .spawn(move || server.run())
        .context("failed to start relay thread")?;

    let mut nodes = Vec::new();
    for layout in &GREENHOUSE {
        nodes.push(start_node(layout, &relay_addr)?);
    }

    let (panel, events) = ControlPanelClient::new(PanelConfig::new(relay_addr.clone()));
    let panel_runner = panel.clone();
    let panel_thread = thread::Builder::new()
        .name("panel".to_string())
        .spawn(move || panel_runner.run())
        .context("failed to start panel thread")?;
    let printer = thread::spawn(move || {
        for event in events {
            log::info!("[panel] {}", console::describe(&event));
        }
    });

    log::info!(
        "Greenhouse running on {}: type `set <node> <actuator> on|off` or `quit`",
        relay_addr
    );
    for line in console::stdin_lines() {
        if line.trim().is_empty() {
            continue;
        }
        match ConsoleCommand::parse(&line) {
            Ok(ConsoleCommand::Quit) => break,
            Ok(ConsoleCommand::Set {
                node_id,
                actuator_id,
                on,
            }) => {
                panel.set_actuator(node_id, actuator_id, on);
            }
            Ok(ConsoleCommand::Toggle(_)) => eprintln!("toggle needs a node, use set"),
            Err(e) => eprintln!("{}", e),
        }
    }

    log::info!("Shutting down the greenhouse");
    for node in nodes {
        node.client.stop();
        for handle in node.threads {
            let _ = handle.join();
        }
    }
    panel.stop();
    let _ = panel_thread.join();
    // The receiver loop ends once the last client handle is gone
    drop(panel);
    let _ = printer.join();
    stop_relay.stop();
    let _ = relay_thread.join();
    Ok(())
}

fn start_node(layout: &NodeLayout, relay_addr: &str) -> anyhow::Result<RunningNode> {
    let client = NodeClient::new(NodeConfig::new(
        relay_addr,
        layout.node_id,
        layout.actuators(),
    ))
    .with_context(|| format!("invalid actuators for node {}", layout.node_id))?;
    let runner = client.clone();
    let run_thread = thread::Builder::new()
        .name(format!("node-{}", layout.node_id))
        .spawn(move || runner.run())
        .with_context(|| format!("failed to start node {}", layout.node_id))?;
    let ticker = spawn_sensor_ticker(client.clone(), layout.sensors(), DEFAULT_SENSING_INTERVAL)
        .with_context(|| format!("failed to start sensors of node {}", layout.node_id))?;
    Ok(RunningNode {
        client,
        threads: vec![run_thread, ticker],
    })
}
