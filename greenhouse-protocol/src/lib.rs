//! # Greenhouse Protocol
//!
//! The line-oriented protocol spoken between the greenhouse relay, sensor/actuator
//! nodes and control panels.
//!
//! ## Wire Format
//!
//! One command per newline-terminated line, the verb separated from its payload by
//! the first `-`:
//! ```text
//! VERB-PAYLOAD\n
//! ```
//!
//! Inside payloads `;` separates major fields, `,` separates list items, a space
//! separates count/type tokens and value/unit, `_` separates a count from its type
//! and `=` separates a key from its value.
//!
//! ## Verbs
//!
//! | Verb | Payload | Direction |
//! |------|---------|-----------|
//! | setNodeType | `ControlPanel` \| `SensorActuator` | peer → relay |
//! | setId | `<nodeId>` | node → relay |
//! | nodeAdded | `<nodeId>;<count>_<type>( <count>_<type>)*` | node → panels |
//! | nodeRemoved | `<nodeId>` | node → panels |
//! | updateSensorData | `<nodeId>;<type>=<value> <unit>(,...)*` | node → panels |
//! | actuatorUpdated | `<nodeId>;<actuatorId>=<bool>` | node → panels |
//! | controlPanelAdded | empty | panel → nodes |
//! | controlPanelUpdateActuator | `<nodeId>;<actuatorId>=<bool>` | panel → one node |
//! | checkConnection | empty | reserved |
//! | getCameraImage / sendCameraImage | `<nodeId>;<base64>` | reserved |

mod messages;
mod signal;
pub mod socket;

pub use messages::{
    split_verb, ActuatorGroup, ActuatorId, ActuatorInfo, ActuatorState, CameraImage, Message,
    NodeDescriptor, NodeId, NodeKind, ProtocolError, SensorReading, MAX_ACTUATORS, MAX_LINE_LEN,
};
pub use signal::StopSignal;
pub use socket::{ConnectionCloser, LineConnection, LineListener, LineReader, LineWriter};
