use greenhouse_node::DEFAULT_SENSING_INTERVAL;
use greenhouse_panel::DEFAULT_ANNOUNCE_DELAY;
use greenhouse_protocol::{ActuatorGroup, NodeId};
use greenhouse_relay::{DEFAULT_BIND, DEFAULT_PORT};
use std::str::FromStr;
use std::time::Duration;

const HELP: &str = "\
Greenhouse - relay, sensor/actuator nodes and control panels over TCP

USAGE:
  greenhouse [OPTIONS] <COMMAND> [COMMAND OPTIONS]

COMMANDS:
  relay                 Run the relay server
    --bind <addr>       Address to listen on (default: 0.0.0.0)
    --port <port>       Port to listen on (default: 10020)

  node                  Run one sensor/actuator node
    --id <n>            Node id (required)
    --relay <host:port> Relay address (default: 127.0.0.1:10020)
    --actuators <list>  Actuator inventory, e.g. \"3_window 2_fan 1_heater\"
    --sensor <spec>     kind:unit:min:max, repeatable
                        (default: temperature and humidity)
    --interval-ms <n>   Sensor push interval (default: 5000)

  panel                 Run a console control panel
    --relay <host:port> Relay address (default: 127.0.0.1:10020)
    --delay-ms <n>      Delay before node and sensor events show (default: 1000)
                        Commands on stdin: set <node> <actuator> on|off, quit

  simulate              Relay, two greenhouse nodes and a panel in one process
    --port <port>       Port for the local relay (default: 10020)
                        Ends on `quit` or end of input

OPTIONS:
  -h, --help            Prints help information
  -v, --verbose         Show connection events
  -vv, --trace          Show every protocol line
  --log <file>          Write log output to file instead of stderr

The RUST_LOG environment variable overrides the -v levels.
";

/// Verbosity level for log output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Lifecycle events, warnings and errors
    #[default]
    Normal = 0,
    /// Connection and routing decisions
    Verbose = 1,
    /// Every protocol line
    Trace = 2,
}

impl Verbosity {
    pub fn level_filter(self) -> log::LevelFilter {
        match self {
            Verbosity::Normal => log::LevelFilter::Info,
            Verbosity::Verbose => log::LevelFilter::Debug,
            Verbosity::Trace => log::LevelFilter::Trace,
        }
    }
}

/// `--sensor kind:unit:min:max`
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSpec {
    pub kind: String,
    pub unit: String,
    pub min: f64,
    pub max: f64,
}

impl FromStr for SensorSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [kind, unit, min, max] = parts[..] else {
            return Err(format!("expected kind:unit:min:max, got '{}'", s));
        };
        if kind.is_empty() || kind.contains(['=', ',', ' ']) {
            return Err(format!("invalid sensor type '{}'", kind));
        }
        if unit.contains(',') {
            return Err(format!("invalid unit '{}'", unit));
        }
        let bound = |v: &str| v.parse::<f64>().map_err(|_| format!("invalid bound '{}'", v));
        Ok(SensorSpec {
            kind: kind.to_string(),
            unit: unit.to_string(),
            min: bound(min)?,
            max: bound(max)?,
        })
    }
}

#[derive(Debug)]
pub struct RelayArgs {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug)]
pub struct NodeArgs {
    pub node_id: NodeId,
    pub relay: String,
    pub actuators: Vec<ActuatorGroup>,
    pub sensors: Vec<SensorSpec>,
    pub interval: Duration,
}

#[derive(Debug)]
pub struct PanelArgs {
    pub relay: String,
    pub delay: Duration,
}

#[derive(Debug)]
pub struct SimulateArgs {
    pub port: u16,
}

#[derive(Debug)]
pub enum Command {
    Relay(RelayArgs),
    Node(NodeArgs),
    Panel(PanelArgs),
    Simulate(SimulateArgs),
}

#[derive(Debug)]
pub struct AppArgs {
    pub command: Command,
    pub verbosity: Verbosity,
    pub log_file: Option<String>,
}

pub fn default_relay_addr() -> String {
    format!("127.0.0.1:{}", DEFAULT_PORT)
}

pub fn parse_args() -> Result<AppArgs, pico_args::Error> {
    let mut pargs = pico_args::Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{}", HELP);
        std::process::exit(0);
    }

    let args = parse_from(&mut pargs)?;

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        eprintln!("Warning: unused arguments left: {:?}.", remaining);
    }

    Ok(args)
}

fn parse_from(pargs: &mut pico_args::Arguments) -> Result<AppArgs, pico_args::Error> {
    // Check -vv before -v, pico-args matches flags exactly
    let verbosity = if pargs.contains("--trace") || pargs.contains("-vv") {
        Verbosity::Trace
    } else if pargs.contains(["-v", "--verbose"]) {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    };
    let log_file = pargs.opt_value_from_str("--log")?;

    let command = match pargs.subcommand()?.as_deref() {
        Some("relay") => Command::Relay(RelayArgs {
            bind: pargs
                .opt_value_from_str("--bind")?
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
            port: pargs.opt_value_from_str("--port")?.unwrap_or(DEFAULT_PORT),
        }),
        Some("node") => Command::Node(NodeArgs {
            node_id: pargs.value_from_str("--id")?,
            relay: pargs
                .opt_value_from_str("--relay")?
                .unwrap_or_else(default_relay_addr),
            actuators: pargs
                .opt_value_from_fn("--actuators", ActuatorGroup::parse_list)?
                .unwrap_or_default(),
            sensors: pargs.values_from_str("--sensor")?,
            interval: pargs
                .opt_value_from_str("--interval-ms")?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_SENSING_INTERVAL),
        }),
        Some("panel") => Command::Panel(PanelArgs {
            relay: pargs
                .opt_value_from_str("--relay")?
                .unwrap_or_else(default_relay_addr),
            delay: pargs
                .opt_value_from_str("--delay-ms")?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_ANNOUNCE_DELAY),
        }),
        Some("simulate") => Command::Simulate(SimulateArgs {
            port: pargs.opt_value_from_str("--port")?.unwrap_or(DEFAULT_PORT),
        }),
        Some(other) => {
            return Err(pico_args::Error::ArgumentParsingFailed {
                cause: format!("unknown command '{}', see --help", other),
            })
        }
        None => return Err(pico_args::Error::MissingArgument),
    };

    Ok(AppArgs {
        command,
        verbosity,
        log_file,
    })
}
