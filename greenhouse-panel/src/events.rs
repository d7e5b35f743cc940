//! Notifications a control panel raises, and their delivery.

use greenhouse_protocol::{ActuatorState, CameraImage, NodeDescriptor, NodeId, SensorReading, StopSignal};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// Something a control panel user interface reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum PanelEvent {
    /// Registered with the relay
    Connected,
    /// Relay connection lost or closed
    Disconnected,
    NodeAdded(NodeDescriptor),
    NodeRemoved(NodeId),
    SensorData {
        node_id: NodeId,
        readings: Vec<SensorReading>,
    },
    ActuatorChanged(ActuatorState),
    CameraImage(CameraImage),
}

/// Delivers events to the panel's receiver.
///
/// Delayed events go through one dispatcher thread, so they arrive in the
/// order they were raised. Immediate events skip the queue.
pub(crate) struct EventDispatcher {
    events: Sender<PanelEvent>,
    delayed: Option<Sender<(Instant, PanelEvent)>>,
    delay: Duration,
}

impl EventDispatcher {
    pub fn new(delay: Duration, stop: StopSignal) -> (Self, Receiver<PanelEvent>) {
        let (events, receiver) = mpsc::channel();

        let delayed = if delay.is_zero() {
            None
        } else {
            let (queue, pending) = mpsc::channel();
            let out = events.clone();
            let spawned = thread::Builder::new()
                .name("panel-events".to_string())
                .spawn(move || run_delayed(pending, out, stop));
            match spawned {
                Ok(_) => Some(queue),
                Err(e) => {
                    log::warn!("Could not start event dispatcher, delivering inline: {}", e);
                    None
                }
            }
        };

        (
            EventDispatcher {
                events,
                delayed,
                delay,
            },
            receiver,
        )
    }

    /// Deliver now
    pub fn emit(&self, event: PanelEvent) {
        if self.events.send(event).is_err() {
            log::trace!("Panel event receiver dropped");
        }
    }

    /// Deliver after the configured delay
    pub fn emit_delayed(&self, event: PanelEvent) {
        match &self.delayed {
            Some(queue) => {
                let due = Instant::now() + self.delay;
                // Dispatcher gone; better late than never
                if let Err(mpsc::SendError((_, event))) = queue.send((due, event)) {
                    self.emit(event);
                }
            }
            None => self.emit(event),
        }
    }
}

fn run_delayed(pending: Receiver<(Instant, PanelEvent)>, out: Sender<PanelEvent>, stop: StopSignal) {
    // Every event carries the same delay, so FIFO order is also due order
    while let Ok((due, event)) = pending.recv() {
        let now = Instant::now();
        if due > now && stop.wait(due - now) {
            break;
        }
        if out.send(event).is_err() {
            break;
        }
    }
    log::trace!("Panel event dispatcher finished");
}
