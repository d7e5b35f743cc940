//! Line commands read from stdin and the text shown for panel events.

use greenhouse_panel::PanelEvent;
use greenhouse_protocol::{ActuatorId, NodeId};
use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver};
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// `set <node> <actuator> on|off`
    Set {
        node_id: NodeId,
        actuator_id: ActuatorId,
        on: bool,
    },
    /// `toggle <actuator>`, for a node's own console
    Toggle(ActuatorId),
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words[..] {
            ["quit"] | ["exit"] => Ok(ConsoleCommand::Quit),
            ["set", node_id, actuator_id, state] => Ok(ConsoleCommand::Set {
                node_id: number(node_id)?,
                actuator_id: number(actuator_id)?,
                on: on_off(state)?,
            }),
            ["toggle", actuator_id] => Ok(ConsoleCommand::Toggle(number(actuator_id)?)),
            _ => Err(format!("unknown command '{}'", line.trim())),
        }
    }
}

fn number(s: &str) -> Result<u32, String> {
    s.parse().map_err(|_| format!("'{}' is not a number", s))
}

fn on_off(s: &str) -> Result<bool, String> {
    match s {
        "on" | "true" => Ok(true),
        "off" | "false" => Ok(false),
        other => Err(format!("expected on or off, got '{}'", other)),
    }
}

/// Stdin lines on a channel; the channel closes at end of input
pub fn stdin_lines() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) => {
                    if tx.send(l).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    rx
}

/// One line of text for a panel event
pub fn describe(event: &PanelEvent) -> String {
    match event {
        PanelEvent::Connected => "connected to relay".to_string(),
        PanelEvent::Disconnected => "disconnected from relay".to_string(),
        PanelEvent::NodeAdded(descriptor) => {
            let actuators: Vec<String> = descriptor
                .actuators
                .iter()
                .map(|a| format!("{}:{}", a.id, a.kind))
                .collect();
            format!("node {} added, actuators [{}]", descriptor.node_id, actuators.join(", "))
        }
        PanelEvent::NodeRemoved(node_id) => format!("node {} removed", node_id),
        PanelEvent::SensorData { node_id, readings } => {
            let readings: Vec<String> = readings.iter().map(|r| r.to_string()).collect();
            format!("node {}: {}", node_id, readings.join(", "))
        }
        PanelEvent::ActuatorChanged(state) => format!(
            "node {} actuator {} is {}",
            state.node_id,
            state.actuator_id,
            if state.on { "on" } else { "off" }
        ),
        PanelEvent::CameraImage(image) => {
            format!("node {} sent a camera image ({} bytes)", image.node_id, image.data.len())
        }
    }
}
