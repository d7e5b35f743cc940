//! Greenhouse relay server.
//!
//! Accepts TCP connections from sensor/actuator nodes and control panels,
//! learns each connection's role from its `setNodeType`/`setId` lines and
//! forwards every other line verbatim to the connections that should see it:
//! node events go to all panels, `controlPanelAdded` goes to all nodes and
//! actuator commands go to the node they name.

mod handler;
mod link;
mod registry;
mod server;

pub use handler::{ConnectionHandler, HandlerState, Session};
pub use link::{PeerLink, TcpPeerLink};
pub use registry::{ConnectionId, Registry, Role};
pub use server::{RelayConfig, RelayError, RelayServer, RelayStopHandle, DEFAULT_BIND};

/// Default port for relay connections
pub const DEFAULT_PORT: u16 = 10020;

const PREVIEW_LEN: usize = 120;

/// Start the relay and serve until the process exits
pub fn start(config: RelayConfig) -> Result<(), RelayError> {
    let server = RelayServer::bind(config)?;
    server.run();
    Ok(())
}

/// Shorten a line for logging; camera payloads can be megabytes
pub(crate) fn preview(line: &str) -> &str {
    if line.len() <= PREVIEW_LEN {
        return line;
    }
    let mut end = PREVIEW_LEN;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}
