//! Control panel for the greenhouse relay.
//!
//! A [`ControlPanelClient`] registers as an observer, asks every node to
//! re-announce itself and turns the relay's traffic into [`PanelEvent`]s.
//! Actuator commands go back through [`ControlPanelClient::set_actuator`].

mod client;
mod events;

pub use client::{
    ControlPanelClient, PanelClientState, PanelConfig, DEFAULT_ANNOUNCE_DELAY,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_RECONNECT_DELAY,
};
pub use events::PanelEvent;
