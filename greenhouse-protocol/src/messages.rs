//! Message types and line encoding/decoding for the greenhouse protocol.
//!
//! All delimiter handling lives in this module. Callers build and inspect
//! [`Message`] values and never split protocol strings themselves.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

/// Identifier a node picks for itself. The relay does not check uniqueness.
pub type NodeId = u32;

/// Identifier of an actuator, unique within one node.
pub type ActuatorId = u32;

/// Longest line accepted by a reader (camera images travel as base64 text)
pub const MAX_LINE_LEN: usize = 8 * 1024 * 1024;

/// Most actuators one node may advertise, summed over its whole inventory
pub const MAX_ACTUATORS: u32 = 4096;

/// Verb constants
mod verb {
    pub const SET_NODE_TYPE: &str = "setNodeType";
    pub const SET_ID: &str = "setId";
    pub const NODE_ADDED: &str = "nodeAdded";
    pub const NODE_REMOVED: &str = "nodeRemoved";
    pub const UPDATE_SENSOR_DATA: &str = "updateSensorData";
    pub const ACTUATOR_UPDATED: &str = "actuatorUpdated";
    pub const CONTROL_PANEL_ADDED: &str = "controlPanelAdded";
    pub const CONTROL_PANEL_UPDATE_ACTUATOR: &str = "controlPanelUpdateActuator";
    pub const CHECK_CONNECTION: &str = "checkConnection";
    pub const GET_CAMERA_IMAGE: &str = "getCameraImage";
    pub const SEND_CAMERA_IMAGE: &str = "sendCameraImage";
}

/// Delimiter constants
mod delim {
    pub const VERB: char = '-';
    pub const FIELD: char = ';';
    pub const ITEM: char = ',';
    pub const TOKEN: char = ' ';
    pub const COUNT: char = '_';
    pub const ASSIGN: char = '=';
}

/// Protocol error types
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// I/O error during read/write
    #[error("I/O error: {0}")]
    Io(std::io::Error),
    /// Line starts with a verb this protocol does not define
    #[error("Unknown verb: {0}")]
    UnknownVerb(String),
    /// Line exceeded [`MAX_LINE_LEN`] and was discarded
    #[error("Line too long: more than {0} bytes")]
    LineTooLong(usize),
    /// Known verb with a payload that does not match its grammar
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    /// Connection closed
    #[error("Connection closed")]
    ConnectionClosed,
}

impl ProtocolError {
    /// True for errors confined to a single line. The connection stays usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProtocolError::UnknownVerb(_)
                | ProtocolError::LineTooLong(_)
                | ProtocolError::InvalidFormat(_)
        )
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::ConnectionClosed
        } else {
            ProtocolError::Io(e)
        }
    }
}

fn invalid(msg: impl Into<String>) -> ProtocolError {
    ProtocolError::InvalidFormat(msg.into())
}

/// The role a peer announces with `setNodeType`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    ControlPanel,
    SensorActuator,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::ControlPanel => write!(f, "ControlPanel"),
            NodeKind::SensorActuator => write!(f, "SensorActuator"),
        }
    }
}

impl FromStr for NodeKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ControlPanel" => Ok(NodeKind::ControlPanel),
            "SensorActuator" => Ok(NodeKind::SensorActuator),
            other => Err(invalid(format!("unknown node type '{}'", other))),
        }
    }
}

/// One sensor value as carried by `updateSensorData`
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub kind: String,
    pub value: f64,
    /// May contain spaces, never `,`
    pub unit: String,
}

impl SensorReading {
    pub fn new(kind: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        SensorReading {
            kind: kind.into(),
            value,
            unit: unit.into(),
        }
    }
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} {}", self.kind, self.value, self.unit)
    }
}

/// `count` actuators of one kind, as advertised in `nodeAdded`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorGroup {
    pub count: u32,
    pub kind: String,
}

impl ActuatorGroup {
    pub fn new(count: u32, kind: impl Into<String>) -> Self {
        ActuatorGroup {
            count,
            kind: kind.into(),
        }
    }

    /// Merge groups of the same kind, keeping the order of first occurrence and
    /// dropping empty groups. Fails if the inventory exceeds [`MAX_ACTUATORS`].
    pub fn normalize(groups: &[ActuatorGroup]) -> Result<Vec<ActuatorGroup>, ProtocolError> {
        check_total(groups)?;
        let mut merged: Vec<ActuatorGroup> = Vec::new();
        for group in groups.iter().filter(|g| g.count > 0) {
            match merged.iter_mut().find(|m| m.kind == group.kind) {
                Some(existing) => {
                    existing.count = existing
                        .count
                        .checked_add(group.count)
                        .ok_or_else(too_many_actuators)?;
                }
                None => merged.push(group.clone()),
            }
        }
        Ok(merged)
    }

    /// Parse a space separated inventory such as `2_window 1_heater`
    pub fn parse_list(s: &str) -> Result<Vec<ActuatorGroup>, ProtocolError> {
        let groups = s
            .split(delim::TOKEN)
            .filter(|token| !token.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<ActuatorGroup>, _>>()?;
        check_total(&groups)?;
        Ok(groups)
    }
}

fn too_many_actuators() -> ProtocolError {
    invalid(format!("more than {} actuators", MAX_ACTUATORS))
}

/// Fails unless the inventory holds at most [`MAX_ACTUATORS`] actuators
fn check_total(groups: &[ActuatorGroup]) -> Result<(), ProtocolError> {
    let total = groups
        .iter()
        .try_fold(0u32, |total, g| total.checked_add(g.count))
        .ok_or_else(too_many_actuators)?;
    if total > MAX_ACTUATORS {
        return Err(too_many_actuators());
    }
    Ok(())
}

impl fmt::Display for ActuatorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.count, delim::COUNT, self.kind)
    }
}

impl FromStr for ActuatorGroup {
    type Err = ProtocolError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let (count, kind) = token
            .split_once(delim::COUNT)
            .ok_or_else(|| invalid(format!("actuator token '{}' has no count", token)))?;
        if kind.is_empty() {
            return Err(invalid(format!("actuator token '{}' has no type", token)));
        }
        let count: u32 = parse_number(count, "actuator count")?;
        if count > MAX_ACTUATORS {
            return Err(too_many_actuators());
        }
        Ok(ActuatorGroup {
            count,
            kind: kind.to_string(),
        })
    }
}

/// A single actuator of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorInfo {
    pub id: ActuatorId,
    pub kind: String,
}

/// Identity and actuator inventory of a node, as advertised by `nodeAdded`.
///
/// Actuator ids are numbered from 1 in inventory order, so a node and every
/// control panel that parsed its `nodeAdded` line agree on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub node_id: NodeId,
    pub actuators: Vec<ActuatorInfo>,
}

impl NodeDescriptor {
    /// Number the actuators of `groups`. Anything past [`MAX_ACTUATORS`] is
    /// left out; inventories read off the wire are already checked.
    pub fn from_groups(node_id: NodeId, groups: &[ActuatorGroup]) -> Self {
        let actuators = groups
            .iter()
            .flat_map(|g| std::iter::repeat(g.kind.as_str()).take(g.count as usize))
            .take(MAX_ACTUATORS as usize)
            .zip(1..)
            .map(|(kind, id)| ActuatorInfo {
                id,
                kind: kind.to_string(),
            })
            .collect();
        NodeDescriptor { node_id, actuators }
    }

    /// Runs of same-kind actuators in id order
    pub fn groups(&self) -> Vec<ActuatorGroup> {
        let mut groups: Vec<ActuatorGroup> = Vec::new();
        for actuator in &self.actuators {
            match groups.last_mut() {
                Some(last) if last.kind == actuator.kind => last.count += 1,
                _ => groups.push(ActuatorGroup::new(1, actuator.kind.clone())),
            }
        }
        groups
    }

    pub fn actuator(&self, id: ActuatorId) -> Option<&ActuatorInfo> {
        self.actuators.iter().find(|a| a.id == id)
    }
}

/// Desired or reported on/off state of one actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorState {
    pub node_id: NodeId,
    pub actuator_id: ActuatorId,
    pub on: bool,
}

/// Opaque camera image, base64 text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraImage {
    pub node_id: NodeId,
    pub data: String,
}

/// Commands exchanged between peers and the relay
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Peer announces its role
    SetNodeType(NodeKind),

    /// Node announces its id
    SetId(NodeId),

    /// Node advertises its actuator inventory
    NodeAdded(NodeDescriptor),

    /// Node is leaving
    NodeRemoved(NodeId),

    /// Fresh sensor readings from a node
    UpdateSensorData {
        node_id: NodeId,
        readings: Vec<SensorReading>,
    },

    /// Actuator state changed on a node
    ActuatorUpdated(ActuatorState),

    /// A control panel joined; nodes re-announce themselves
    ControlPanelAdded,

    /// Control panel asks one node to set an actuator
    ControlPanelUpdateActuator(ActuatorState),

    /// Reserved liveness probe
    CheckConnection,

    /// Reserved camera request, payload kept verbatim
    GetCameraImage(String),

    /// Camera image from a node
    SendCameraImage(CameraImage),
}

impl Message {
    /// The verb this message is sent with
    pub fn verb(&self) -> &'static str {
        match self {
            Message::SetNodeType(_) => verb::SET_NODE_TYPE,
            Message::SetId(_) => verb::SET_ID,
            Message::NodeAdded(_) => verb::NODE_ADDED,
            Message::NodeRemoved(_) => verb::NODE_REMOVED,
            Message::UpdateSensorData { .. } => verb::UPDATE_SENSOR_DATA,
            Message::ActuatorUpdated(_) => verb::ACTUATOR_UPDATED,
            Message::ControlPanelAdded => verb::CONTROL_PANEL_ADDED,
            Message::ControlPanelUpdateActuator(_) => verb::CONTROL_PANEL_UPDATE_ACTUATOR,
            Message::CheckConnection => verb::CHECK_CONNECTION,
            Message::GetCameraImage(_) => verb::GET_CAMERA_IMAGE,
            Message::SendCameraImage(_) => verb::SEND_CAMERA_IMAGE,
        }
    }

    /// Encode message to a protocol line (without the trailing newline)
    pub fn encode(&self) -> String {
        let payload = match self {
            Message::SetNodeType(kind) => kind.to_string(),
            Message::SetId(id) | Message::NodeRemoved(id) => id.to_string(),
            Message::NodeAdded(descriptor) => {
                let groups: Vec<String> =
                    descriptor.groups().iter().map(|g| g.to_string()).collect();
                format!(
                    "{}{}{}",
                    descriptor.node_id,
                    delim::FIELD,
                    groups.join(delim::TOKEN.to_string().as_str())
                )
            }
            Message::UpdateSensorData { node_id, readings } => {
                let items: Vec<String> = readings.iter().map(|r| r.to_string()).collect();
                format!(
                    "{}{}{}",
                    node_id,
                    delim::FIELD,
                    items.join(delim::ITEM.to_string().as_str())
                )
            }
            Message::ActuatorUpdated(state) | Message::ControlPanelUpdateActuator(state) => {
                format!(
                    "{}{}{}{}{}",
                    state.node_id,
                    delim::FIELD,
                    state.actuator_id,
                    delim::ASSIGN,
                    state.on
                )
            }
            Message::ControlPanelAdded | Message::CheckConnection => String::new(),
            Message::GetCameraImage(payload) => payload.clone(),
            Message::SendCameraImage(image) => {
                format!("{}{}{}", image.node_id, delim::FIELD, image.data)
            }
        };
        format!("{}{}{}", self.verb(), delim::VERB, payload)
    }

    /// Decode a protocol line (without the trailing newline)
    pub fn decode(line: &str) -> Result<Message, ProtocolError> {
        let (verb, payload) = split_verb(line);
        let message = match verb {
            verb::SET_NODE_TYPE => Message::SetNodeType(payload.parse()?),
            verb::SET_ID => Message::SetId(parse_number(payload, "node id")?),
            verb::NODE_ADDED => Message::NodeAdded(decode_node_added(payload)?),
            verb::NODE_REMOVED => Message::NodeRemoved(parse_number(payload, "node id")?),
            verb::UPDATE_SENSOR_DATA => {
                let (node_id, list) = split_field(payload)?;
                let readings = list
                    .split(delim::ITEM)
                    .filter(|item| !item.trim().is_empty())
                    .map(decode_reading)
                    .collect::<Result<Vec<_>, _>>()?;
                Message::UpdateSensorData {
                    node_id: parse_number(node_id, "node id")?,
                    readings,
                }
            }
            verb::ACTUATOR_UPDATED => Message::ActuatorUpdated(decode_actuator_state(payload)?),
            verb::CONTROL_PANEL_ADDED => Message::ControlPanelAdded,
            verb::CONTROL_PANEL_UPDATE_ACTUATOR => {
                Message::ControlPanelUpdateActuator(decode_actuator_state(payload)?)
            }
            verb::CHECK_CONNECTION => Message::CheckConnection,
            verb::GET_CAMERA_IMAGE => Message::GetCameraImage(payload.to_string()),
            verb::SEND_CAMERA_IMAGE => {
                let (node_id, data) = split_field(payload)?;
                Message::SendCameraImage(CameraImage {
                    node_id: parse_number(node_id, "node id")?,
                    data: data.to_string(),
                })
            }
            other => return Err(ProtocolError::UnknownVerb(other.to_string())),
        };
        Ok(message)
    }

    /// Write message as one line to a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), ProtocolError> {
        write_line(writer, &self.encode())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Split a line into verb and payload at the first `-`.
/// A line without `-` is a verb with an empty payload.
pub fn split_verb(line: &str) -> (&str, &str) {
    line.split_once(delim::VERB).unwrap_or((line, ""))
}

pub(crate) fn write_line<W: Write>(writer: &mut W, line: &str) -> Result<(), ProtocolError> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

fn parse_number<T: FromStr>(s: &str, what: &str) -> Result<T, ProtocolError> {
    s.trim()
        .parse()
        .map_err(|_| invalid(format!("invalid {} '{}'", what, s)))
}

fn parse_bool(s: &str) -> Result<bool, ProtocolError> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if s.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(invalid(format!("invalid boolean '{}'", s)))
    }
}

fn split_field(payload: &str) -> Result<(&str, &str), ProtocolError> {
    payload
        .split_once(delim::FIELD)
        .ok_or_else(|| invalid(format!("missing '{}' in '{}'", delim::FIELD, payload)))
}

fn decode_node_added(payload: &str) -> Result<NodeDescriptor, ProtocolError> {
    // A node without actuators may omit the inventory entirely
    let (node_id, inventory) = payload.split_once(delim::FIELD).unwrap_or((payload, ""));
    let node_id = parse_number(node_id, "node id")?;
    let groups = ActuatorGroup::parse_list(inventory)?;
    Ok(NodeDescriptor::from_groups(node_id, &groups))
}

fn decode_reading(item: &str) -> Result<SensorReading, ProtocolError> {
    let (kind, rest) = item
        .split_once(delim::ASSIGN)
        .ok_or_else(|| invalid(format!("sensor reading '{}' has no '='", item)))?;
    // Value ends at the first space, the unit is everything after it
    let (value, unit) = rest
        .split_once(delim::TOKEN)
        .ok_or_else(|| invalid(format!("sensor reading '{}' has no unit", item)))?;
    if kind.is_empty() {
        return Err(invalid(format!("sensor reading '{}' has no type", item)));
    }
    Ok(SensorReading {
        kind: kind.to_string(),
        value: parse_number(value, "sensor value")?,
        unit: unit.to_string(),
    })
}

fn decode_actuator_state(payload: &str) -> Result<ActuatorState, ProtocolError> {
    let (node_id, assignment) = split_field(payload)?;
    let (actuator_id, on) = assignment
        .split_once(delim::ASSIGN)
        .ok_or_else(|| invalid(format!("missing '{}' in '{}'", delim::ASSIGN, payload)))?;
    Ok(ActuatorState {
        node_id: parse_number(node_id, "node id")?,
        actuator_id: parse_number(actuator_id, "actuator id")?,
        on: parse_bool(on)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_node_added() {
        let descriptor = NodeDescriptor::from_groups(
            1,
            &[ActuatorGroup::new(2, "window"), ActuatorGroup::new(1, "heater")],
        );
        let msg = Message::NodeAdded(descriptor);
        assert_eq!(msg.encode(), "nodeAdded-1;2_window 1_heater");
    }

    #[test]
    fn test_node_added_assigns_actuator_ids_in_order() {
        let msg = Message::decode("nodeAdded-4;2_window 1_heater").unwrap();
        let Message::NodeAdded(descriptor) = msg else {
            panic!("expected NodeAdded");
        };
        assert_eq!(descriptor.node_id, 4);
        let kinds: Vec<(u32, &str)> = descriptor
            .actuators
            .iter()
            .map(|a| (a.id, a.kind.as_str()))
            .collect();
        assert_eq!(kinds, vec![(1, "window"), (2, "window"), (3, "heater")]);
    }

    #[test]
    fn test_node_added_tolerates_trailing_space_and_missing_inventory() {
        let msg = Message::decode("nodeAdded-4;3_window ").unwrap();
        assert!(matches!(msg, Message::NodeAdded(ref d) if d.actuators.len() == 3));

        let msg = Message::decode("nodeAdded-1").unwrap();
        assert_eq!(msg, Message::NodeAdded(NodeDescriptor::from_groups(1, &[])));
    }

    #[test]
    fn test_sensor_data_unit_may_contain_spaces() {
        let msg = Message::decode("updateSensorData-1;temperature=27.4 °C,light=300 lux avg,").unwrap();
        assert_eq!(
            msg,
            Message::UpdateSensorData {
                node_id: 1,
                readings: vec![
                    SensorReading::new("temperature", 27.4, "°C"),
                    SensorReading::new("light", 300.0, "lux avg"),
                ],
            }
        );
    }

    #[test]
    fn test_negative_sensor_value_survives_verb_split() {
        let msg = Message::decode("updateSensorData-2;temperature=-3.5 °C").unwrap();
        assert_eq!(
            msg,
            Message::UpdateSensorData {
                node_id: 2,
                readings: vec![SensorReading::new("temperature", -3.5, "°C")],
            }
        );
        assert_eq!(msg.encode(), "updateSensorData-2;temperature=-3.5 °C");
    }

    #[test]
    fn test_actuator_command() {
        let msg = Message::decode("controlPanelUpdateActuator-7;3=true").unwrap();
        assert_eq!(
            msg,
            Message::ControlPanelUpdateActuator(ActuatorState {
                node_id: 7,
                actuator_id: 3,
                on: true,
            })
        );
        assert_eq!(msg.encode(), "controlPanelUpdateActuator-7;3=true");
    }

    #[test]
    fn test_empty_payload_verbs() {
        assert_eq!(Message::decode("controlPanelAdded-").unwrap(), Message::ControlPanelAdded);
        assert_eq!(Message::decode("controlPanelAdded").unwrap(), Message::ControlPanelAdded);
        assert_eq!(Message::decode("checkConnection-").unwrap(), Message::CheckConnection);
        assert_eq!(Message::ControlPanelAdded.encode(), "controlPanelAdded-");
    }

    #[test]
    fn test_set_node_type_and_id() {
        assert_eq!(
            Message::decode("setNodeType-SensorActuator").unwrap(),
            Message::SetNodeType(NodeKind::SensorActuator)
        );
        assert_eq!(Message::decode("setId-12").unwrap(), Message::SetId(12));
        assert!(matches!(
            Message::decode("setId--1"),
            Err(ProtocolError::InvalidFormat(_))
        ));
        assert!(matches!(
            Message::decode("setNodeType-Toaster"),
            Err(ProtocolError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_malformed_payloads_are_recoverable() {
        for line in [
            "controlPanelUpdateActuator-7;3",
            "controlPanelUpdateActuator-7;3=maybe",
            "actuatorUpdated-x;1=true",
            "updateSensorData-1;temperature 20",
            "nodeAdded-1;window",
        ] {
            let err = Message::decode(line).unwrap_err();
            assert!(err.is_recoverable(), "{}: {:?}", line, err);
        }
    }

    #[test]
    fn test_unknown_verb() {
        let err = Message::decode("launchRocket-now").unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownVerb(ref v) if v == "launchRocket"));
        assert!(err.is_recoverable());
        assert!(!ProtocolError::ConnectionClosed.is_recoverable());
    }

    #[test]
    fn test_camera_image_payload_is_opaque() {
        let msg = Message::decode("sendCameraImage-3;iVBORw0KGgo=").unwrap();
        assert_eq!(
            msg,
            Message::SendCameraImage(CameraImage {
                node_id: 3,
                data: "iVBORw0KGgo=".to_string(),
            })
        );
    }

    #[test]
    fn test_normalize_groups() {
        let groups = ActuatorGroup::normalize(&[
            ActuatorGroup::new(1, "window"),
            ActuatorGroup::new(1, "heater"),
            ActuatorGroup::new(2, "window"),
            ActuatorGroup::new(0, "fan"),
        ])
        .unwrap();
        assert_eq!(
            groups,
            vec![ActuatorGroup::new(3, "window"), ActuatorGroup::new(1, "heater")]
        );
    }

    #[test]
    fn test_normalize_rejects_overflowing_inventory() {
        let err = ActuatorGroup::normalize(&[
            ActuatorGroup::new(u32::MAX, "a"),
            ActuatorGroup::new(1, "a"),
        ])
        .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidFormat(_)));

        let err = ActuatorGroup::normalize(&[ActuatorGroup::new(MAX_ACTUATORS + 1, "fan")]);
        assert!(err.is_err());
    }

    #[test]
    fn test_huge_inventory_is_rejected() {
        for line in [
            "nodeAdded-1;4000000000_window",
            "nodeAdded-1;4096_window 1_fan",
            "nodeAdded-1;4294967295_a 4294967295_b",
        ] {
            let err = Message::decode(line).unwrap_err();
            assert!(matches!(err, ProtocolError::InvalidFormat(_)), "{}: {:?}", line, err);
            assert!(err.is_recoverable());
        }
        assert!(ActuatorGroup::parse_list("4294967295_a 1_a").is_err());

        let msg = Message::decode("nodeAdded-1;4000_window 96_fan").unwrap();
        assert!(matches!(msg, Message::NodeAdded(ref d) if d.actuators.len() == 4096));
    }

    #[test]
    fn test_write_to_terminates_line() {
        let mut out = Vec::new();
        Message::NodeRemoved(5).write_to(&mut out).unwrap();
        assert_eq!(out, b"nodeRemoved-5\n");
    }
}
