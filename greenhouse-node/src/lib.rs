//! Sensor/actuator node for the greenhouse relay.
//!
//! [`NodeClient`] keeps a node registered with the relay across connection
//! loss, pushes sensor readings and actuator changes, and applies the actuator
//! commands control panels route to it. [`spawn_sensor_ticker`] drives a set of
//! [`SensorSource`]s on a fixed interval.

mod actuators;
mod client;
mod sensors;

pub use actuators::ActuatorBank;
pub use client::{
    NodeClient, NodeClientState, NodeConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_RECONNECT_DELAY,
};
pub use sensors::{spawn_sensor_ticker, RandomWalkSensor, SensorSource, DEFAULT_SENSING_INTERVAL};
