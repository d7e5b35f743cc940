//! Local actuator state of a node.

use greenhouse_protocol::{ActuatorGroup, ActuatorId, NodeDescriptor, NodeId, ProtocolError};
use std::collections::BTreeMap;

/// The actuators a node owns, all off initially
#[derive(Debug, Clone)]
pub struct ActuatorBank {
    descriptor: NodeDescriptor,
    states: BTreeMap<ActuatorId, bool>,
}

impl ActuatorBank {
    /// Build the bank from an inventory. Groups of the same kind are merged so
    /// the advertised inventory lists each kind once, in order of first
    /// occurrence; ids are assigned from 1 in that order.
    pub fn new(node_id: NodeId, groups: &[ActuatorGroup]) -> Result<Self, ProtocolError> {
        let descriptor = NodeDescriptor::from_groups(node_id, &ActuatorGroup::normalize(groups)?);
        let states = descriptor.actuators.iter().map(|a| (a.id, false)).collect();
        Ok(ActuatorBank { descriptor, states })
    }

    pub fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    pub fn is_on(&self, id: ActuatorId) -> Option<bool> {
        self.states.get(&id).copied()
    }

    /// Set one actuator. Returns `None` if the id is not ours.
    pub fn set(&mut self, id: ActuatorId, on: bool) -> Option<bool> {
        let state = self.states.get_mut(&id)?;
        *state = on;
        Some(on)
    }

    /// Flip one actuator and return its new state
    pub fn toggle(&mut self, id: ActuatorId) -> Option<bool> {
        let state = self.states.get_mut(&id)?;
        *state = !*state;
        Some(*state)
    }

    /// `(id, on)` for every actuator, ordered by id
    pub fn states(&self) -> Vec<(ActuatorId, bool)> {
        self.states.iter().map(|(id, on)| (*id, *on)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_is_grouped_by_kind() {
        let bank = ActuatorBank::new(
            2,
            &[
                ActuatorGroup::new(1, "window"),
                ActuatorGroup::new(2, "fan"),
                ActuatorGroup::new(2, "window"),
            ],
        )
        .unwrap();
        assert_eq!(
            bank.descriptor().groups(),
            vec![ActuatorGroup::new(3, "window"), ActuatorGroup::new(2, "fan")]
        );
        assert_eq!(bank.descriptor().actuator(3).map(|a| a.kind.as_str()), Some("window"));
        assert_eq!(bank.descriptor().actuator(4).map(|a| a.kind.as_str()), Some("fan"));
    }

    #[test]
    fn test_set_and_toggle() {
        let mut bank = ActuatorBank::new(1, &[ActuatorGroup::new(2, "heater")]).unwrap();
        assert_eq!(bank.is_on(1), Some(false));

        assert_eq!(bank.set(2, true), Some(true));
        assert_eq!(bank.toggle(1), Some(true));
        assert_eq!(bank.toggle(2), Some(false));
        assert_eq!(bank.states(), vec![(1, true), (2, false)]);
    }

    #[test]
    fn test_unknown_actuator_is_ignored() {
        let mut bank = ActuatorBank::new(1, &[ActuatorGroup::new(1, "heater")]).unwrap();
        assert_eq!(bank.set(9, true), None);
        assert_eq!(bank.toggle(0), None);
        assert_eq!(bank.states(), vec![(1, false)]);
    }

    #[test]
    fn test_oversized_inventory_is_rejected() {
        let groups = [ActuatorGroup::new(u32::MAX, "fan"), ActuatorGroup::new(1, "fan")];
        assert!(ActuatorBank::new(1, &groups).is_err());
    }
}
