mod console;
mod logger;
mod parse_args;
mod simulation;

use anyhow::Context;
use console::ConsoleCommand;
use greenhouse_node::{spawn_sensor_ticker, NodeClient, NodeConfig, RandomWalkSensor, SensorSource};
use greenhouse_panel::{ControlPanelClient, PanelConfig};
use greenhouse_relay::RelayConfig;
use parse_args::{parse_args, Command, NodeArgs, PanelArgs, RelayArgs};
use std::thread;

fn main() {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error parsing arguments: {}", e);
            eprintln!("Try 'greenhouse --help'");
            std::process::exit(1);
        }
    };

    if let Err(e) = logger::init(args.verbosity, args.log_file.as_deref()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    let result = match args.command {
        Command::Relay(relay) => run_relay(relay),
        Command::Node(node) => run_node(node),
        Command::Panel(panel) => run_panel(panel),
        Command::Simulate(simulate) => simulation::run(simulate),
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run_relay(args: RelayArgs) -> anyhow::Result<()> {
    greenhouse_relay::start(RelayConfig {
        bind_addr: args.bind,
        port: args.port,
        ..RelayConfig::default()
    })
    .context("relay could not start")
}

fn run_node(args: NodeArgs) -> anyhow::Result<()> {
    let client = NodeClient::new(NodeConfig::new(args.relay, args.node_id, args.actuators))
        .context("invalid actuator inventory")?;

    let sensors: Vec<Box<dyn SensorSource>> = if args.sensors.is_empty() {
        vec![
            Box::new(RandomWalkSensor::temperature()),
            Box::new(RandomWalkSensor::humidity()),
        ]
    } else {
        args.sensors
            .iter()
            .map(|s| -> Box<dyn SensorSource> {
                Box::new(RandomWalkSensor::new(&s.kind, &s.unit, s.min, s.max))
            })
            .collect()
    };
    let ticker = spawn_sensor_ticker(client.clone(), sensors, args.interval)
        .context("failed to start sensor thread")?;

    // Local actuator switches, like the buttons of a node's own window
    let console_client = client.clone();
    thread::spawn(move || {
        for line in console::stdin_lines() {
            if line.trim().is_empty() {
                continue;
            }
            match ConsoleCommand::parse(&line) {
                Ok(ConsoleCommand::Quit) => {
                    console_client.stop();
                    break;
                }
                Ok(ConsoleCommand::Toggle(id)) => {
                    console_client.toggle_actuator(id);
                }
                Ok(ConsoleCommand::Set {
                    node_id,
                    actuator_id,
                    on,
                }) if node_id == console_client.node_id() => {
                    console_client.set_actuator(actuator_id, on);
                }
                Ok(ConsoleCommand::Set { node_id, .. }) => {
                    eprintln!("this is node {}, not {}", console_client.node_id(), node_id)
                }
                Err(e) => eprintln!("{}", e),
            }
        }
    });

    client.run();
    let _ = ticker.join();
    Ok(())
}

fn run_panel(args: PanelArgs) -> anyhow::Result<()> {
    let (client, events) = ControlPanelClient::new(PanelConfig {
        announce_delay: args.delay,
        ..PanelConfig::new(args.relay)
    });

    thread::spawn(move || {
        for event in events {
            println!("{}", console::describe(&event));
        }
    });

    let console_client = client.clone();
    thread::spawn(move || {
        for line in console::stdin_lines() {
            if line.trim().is_empty() {
                continue;
            }
            match ConsoleCommand::parse(&line) {
                Ok(ConsoleCommand::Quit) => {
                    console_client.stop();
                    break;
                }
                Ok(ConsoleCommand::Set {
                    node_id,
                    actuator_id,
                    on,
                }) => {
                    if !console_client.set_actuator(node_id, actuator_id, on) {
                        eprintln!("not connected to the relay");
                    }
                }
                Ok(ConsoleCommand::Toggle(_)) => eprintln!("use set <node> <actuator> on|off"),
                Err(e) => eprintln!("{}", e),
            }
        }
    });

    client.run();
    Ok(())
}
