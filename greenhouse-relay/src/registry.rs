//! Live table of relay connections and the routing rules over it.

use crate::link::PeerLink;
use greenhouse_protocol::{NodeId, NodeKind};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Identifier the relay assigns to each accepted connection
pub type ConnectionId = u64;

/// Role of a registered connection.
///
/// A connection stays `Unset` until it sends `setNodeType`; nothing is routed
/// to it until then.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Unset,
    ControlPanel,
    /// `node_id` is `None` until the node has sent `setId`
    SensorActuator { node_id: Option<NodeId> },
}

impl Role {
    pub fn kind(&self) -> Option<NodeKind> {
        match self {
            Role::Unset => None,
            Role::ControlPanel => Some(NodeKind::ControlPanel),
            Role::SensorActuator { .. } => Some(NodeKind::SensorActuator),
        }
    }
}

struct Entry {
    role: Role,
    link: Arc<dyn PeerLink>,
}

/// The set of live connections.
///
/// Every access goes through one mutex. Broadcasts copy the matching links
/// out under the lock and write to them after releasing it.
#[derive(Default)]
pub struct Registry {
    entries: Mutex<HashMap<ConnectionId, Entry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ConnectionId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a connection with role `Unset`. Returns false if the id is taken.
    pub fn register(&self, id: ConnectionId, link: Arc<dyn PeerLink>) -> bool {
        let mut entries = self.entries();
        if entries.contains_key(&id) {
            return false;
        }
        entries.insert(
            id,
            Entry {
                role: Role::Unset,
                link,
            },
        );
        true
    }

    /// Change the role of a registered connection
    pub fn set_role(&self, id: ConnectionId, role: Role) -> bool {
        match self.entries().get_mut(&id) {
            Some(entry) => {
                entry.role = role;
                true
            }
            None => false,
        }
    }

    /// Remove a connection. Removing an unknown id is a no-op.
    pub fn deregister(&self, id: ConnectionId) -> bool {
        self.entries().remove(&id).is_some()
    }

    pub fn role(&self, id: ConnectionId) -> Option<Role> {
        self.entries().get(&id).map(|entry| entry.role)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// All connections and their roles, ordered by connection id
    pub fn snapshot(&self) -> Vec<(ConnectionId, Role)> {
        let mut roles: Vec<_> = self
            .entries()
            .iter()
            .map(|(id, entry)| (*id, entry.role))
            .collect();
        roles.sort_by_key(|(id, _)| *id);
        roles
    }

    fn links_where(&self, pred: impl Fn(&Role) -> bool) -> Vec<Arc<dyn PeerLink>> {
        self.entries()
            .values()
            .filter(|entry| pred(&entry.role))
            .map(|entry| entry.link.clone())
            .collect()
    }

    /// Send `line` to every connection of the given kind.
    /// Returns the number of connections it was handed to.
    pub fn route_to_role(&self, kind: NodeKind, line: &str) -> usize {
        let links = self.links_where(|role| role.kind() == Some(kind));
        for link in &links {
            link.send_line(line);
        }
        links.len()
    }

    /// Send `line` to the node connection(s) that announced `node_id`.
    /// Returns 0 when no live node matches; the line is then dropped.
    pub fn route_to_node(&self, node_id: NodeId, line: &str) -> usize {
        let links = self.links_where(|role| {
            matches!(role, Role::SensorActuator { node_id: Some(id) } if *id == node_id)
        });
        for link in &links {
            link.send_line(line);
        }
        links.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::tests::RecordingLink;

    #[test]
    fn test_register_starts_unset_and_rejects_duplicates() {
        let registry = Registry::new();
        assert!(registry.register(1, RecordingLink::new()));
        assert!(!registry.register(1, RecordingLink::new()));
        assert_eq!(registry.role(1), Some(Role::Unset));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unset_connections_receive_nothing() {
        let registry = Registry::new();
        let link = RecordingLink::new();
        registry.register(1, link.clone());

        assert_eq!(registry.route_to_role(NodeKind::ControlPanel, "nodeRemoved-1"), 0);
        assert_eq!(registry.route_to_role(NodeKind::SensorActuator, "controlPanelAdded-"), 0);
        assert!(link.lines().is_empty());
    }

    #[test]
    fn test_route_to_node_needs_an_id() {
        let registry = Registry::new();
        let link = RecordingLink::new();
        registry.register(1, link.clone());
        registry.set_role(1, Role::SensorActuator { node_id: None });

        assert_eq!(registry.route_to_node(1, "controlPanelUpdateActuator-1;1=true"), 0);

        registry.set_role(1, Role::SensorActuator { node_id: Some(1) });
        assert_eq!(registry.route_to_node(1, "controlPanelUpdateActuator-1;1=true"), 1);
        assert_eq!(link.lines(), vec!["controlPanelUpdateActuator-1;1=true"]);
    }

    #[test]
    fn test_deregister() {
        let registry = Registry::new();
        registry.register(4, RecordingLink::new());
        assert!(registry.deregister(4));
        assert!(!registry.deregister(4));
        assert!(registry.is_empty());
        assert!(!registry.set_role(4, Role::ControlPanel));
    }
}
