//! Sensor value sources and the periodic push of their readings.

use crate::client::NodeClient;
use greenhouse_protocol::SensorReading;
use rand::{thread_rng, Rng};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often the simulated greenhouse samples its sensors
pub const DEFAULT_SENSING_INTERVAL: Duration = Duration::from_secs(5);

/// Produces one reading each time it is sampled
pub trait SensorSource: Send {
    fn read(&mut self) -> SensorReading;
}

/// Sensor whose value drifts randomly within `[min, max]`
#[derive(Debug, Clone)]
pub struct RandomWalkSensor {
    kind: String,
    unit: String,
    min: f64,
    max: f64,
    step: f64,
    current: f64,
}

impl RandomWalkSensor {
    /// Starts in the middle of the range and moves at most a tenth of it per
    /// reading. `min` and `max` are swapped if given in the wrong order.
    pub fn new(kind: impl Into<String>, unit: impl Into<String>, min: f64, max: f64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        RandomWalkSensor {
            kind: kind.into(),
            unit: unit.into(),
            min,
            max,
            step: (max - min) / 10.0,
            current: (min + max) / 2.0,
        }
    }

    pub fn temperature() -> Self {
        Self::new("temperature", "°C", 15.0, 30.0)
    }

    pub fn humidity() -> Self {
        Self::new("humidity", "%", 40.0, 90.0)
    }

    pub fn current(&self) -> f64 {
        self.current
    }
}

impl SensorSource for RandomWalkSensor {
    fn read(&mut self) -> SensorReading {
        if self.step > 0.0 {
            let delta = thread_rng().gen_range(-self.step..=self.step);
            self.current = (self.current + delta).clamp(self.min, self.max);
        }
        // Two decimals keep the wire line short
        let value = (self.current * 100.0).round() / 100.0;
        SensorReading::new(self.kind.clone(), value, self.unit.clone())
    }
}

/// Push one reading from every source each `interval`, until the client is
/// stopped. Readings taken while disconnected are dropped.
pub fn spawn_sensor_ticker(
    client: NodeClient,
    mut sources: Vec<Box<dyn SensorSource>>,
    interval: Duration,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("node-{}-sensors", client.node_id()))
        .spawn(move || {
            while !client.wait_stopped(interval) {
                if sources.is_empty() {
                    continue;
                }
                let readings = sources.iter_mut().map(|s| s.read()).collect();
                client.push_sensor_data(readings);
            }
            log::debug!("Node {}: sensor ticker stopped", client.node_id());
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_walk_stays_in_range() {
        let mut sensor = RandomWalkSensor::new("temperature", "°C", 18.0, 22.0);
        for _ in 0..1000 {
            let reading = sensor.read();
            assert_eq!(reading.kind, "temperature");
            assert_eq!(reading.unit, "°C");
            assert!((18.0..=22.0).contains(&reading.value), "{}", reading.value);
        }
    }

    #[test]
    fn test_reversed_range_is_fixed() {
        let mut sensor = RandomWalkSensor::new("humidity", "%", 90.0, 40.0);
        assert_eq!(sensor.current(), 65.0);
        let value = sensor.read().value;
        assert!((40.0..=90.0).contains(&value));
    }

    #[test]
    fn test_constant_range() {
        let mut sensor = RandomWalkSensor::new("light", "lux", 500.0, 500.0);
        assert_eq!(sensor.read().value, 500.0);
    }
}
