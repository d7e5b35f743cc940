//! Log output setup for the command line tool.

use crate::parse_args::Verbosity;
use anyhow::Context;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::File;

/// Crates whose logging follows the -v flags; everything else stays at warn
const OWN_TARGETS: [&str; 5] = [
    "greenhouse",
    "greenhouse_protocol",
    "greenhouse_relay",
    "greenhouse_node",
    "greenhouse_panel",
];

/// Install the global logger, writing to stderr or to `log_file`.
/// `RUST_LOG` takes precedence over `verbosity`.
pub fn init(verbosity: Verbosity, log_file: Option<&str>) -> anyhow::Result<()> {
    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Warn);
    for target in OWN_TARGETS {
        builder.filter(Some(target), verbosity.level_filter());
    }
    builder.parse_default_env();
    builder.format_timestamp_millis();

    if let Some(path) = log_file {
        let file =
            File::create(path).with_context(|| format!("failed to open log file '{}'", path))?;
        builder.target(Target::Pipe(Box::new(file)));
        eprintln!("Logging to: {}", path);
    }

    builder.try_init()?;
    Ok(())
}
