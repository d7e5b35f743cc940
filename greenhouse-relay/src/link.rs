//! Write path from the relay back to one peer.

use greenhouse_protocol::{ConnectionCloser, LineWriter};
use std::net::SocketAddr;
use std::sync::Mutex;

/// Something the relay can hand a protocol line to.
///
/// Delivery is best effort: implementations log failures and never report them
/// back to the router.
pub trait PeerLink: Send + Sync {
    fn send_line(&self, line: &str);
}

/// Socket-backed link owned by a connection handler
pub struct TcpPeerLink {
    writer: Mutex<LineWriter>,
    closer: ConnectionCloser,
    peer: SocketAddr,
}

impl TcpPeerLink {
    pub fn new(writer: LineWriter, closer: ConnectionCloser, peer: SocketAddr) -> Self {
        TcpPeerLink {
            writer: Mutex::new(writer),
            closer,
            peer,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Shut the socket down; a reader blocked on it returns
    pub fn close(&self) {
        self.closer.close();
    }
}

impl PeerLink for TcpPeerLink {
    fn send_line(&self, line: &str) {
        let Ok(mut writer) = self.writer.lock() else {
            log::warn!("{}: writer poisoned, dropping line", self.peer);
            return;
        };
        match writer.send_line(line) {
            Ok(()) => log::trace!("{} -> {}", self.peer, crate::preview(line)),
            Err(e) => log::warn!("{}: write failed: {}", self.peer, e),
        }
    }
}
