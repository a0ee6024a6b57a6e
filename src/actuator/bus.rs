// Motor bus abstraction
//
// The bus is the opaque vendor transport underneath every actuator binding.
// Bindings translate contract units (fractions, rotations, RPM) into the
// native units of their motor family and hand the result to the bus as a
// `Demand`. The bus never blocks: it either queues the demand or fails fast.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::PortId;

/// Control mode of a single demand, in the motor family's native units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum Demand {
    /// Duty cycle in [-1, 1]
    PercentOutput(f64),
    /// Volts, referenced to a 12 V battery
    Voltage(f64),
    /// Native velocity units (RPM or ticks/100ms)
    Velocity(f64),
    /// Plain closed-loop position, native position units
    Position(f64),
    /// Motion-profiled position, native position units
    MotionProfile(f64),
    /// Output off
    Neutral,
}

/// Latest sensor feedback for one device, native units
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub position: f64,
    pub velocity: f64,
}

/// Closed-loop gains pushed to a device at construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Gains {
    pub p: f64,
    pub i: f64,
    pub d: f64,
    pub f: f64,
    pub i_zone: f64,
}

/// Motion profile limits, native units
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileLimits {
    pub cruise_velocity: f64,
    pub acceleration: f64,
    /// S-curve smoothing (0 = trapezoidal)
    pub smoothing: u8,
}

/// One-time device configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSettings {
    pub inverted: bool,
    pub sensor_phase: bool,
    /// Seconds from neutral to full open-loop output (0 = no ramp)
    pub ramp_rate: f64,
    pub peak_output_forward: f64,
    pub peak_output_reverse: f64,
    pub gains: Gains,
    pub profile: Option<ProfileLimits>,
    pub has_sensor: bool,
}

/// Error types for bus communication
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BusError {
    #[error("Device {id} was never configured on this bus")]
    UnknownDevice { id: PortId },

    #[error("Device {id} is not responding")]
    NotResponding { id: PortId },

    #[error("No feedback from device {id}")]
    NoFeedback { id: PortId },
}

pub type Result<T> = std::result::Result<T, BusError>;

/// The vendor transport seen by actuator bindings
pub trait MotorBus {
    /// Register a device and push its settings
    fn configure(&mut self, id: PortId, settings: &DeviceSettings) -> Result<()>;

    /// Queue a demand for the current tick
    fn send(&mut self, id: PortId, demand: Demand) -> Result<()>;

    /// Latest feedback received for the device
    fn feedback(&self, id: PortId) -> Result<Feedback>;

    /// Overwrite the device's sensor position
    fn set_sensor_position(&mut self, id: PortId, position: f64) -> Result<()>;
}

/// Bus shared by every binding on the robot. The control loop is single
/// threaded, so bindings borrow it only for the duration of one call.
pub type SharedBus = Rc<RefCell<dyn MotorBus>>;

/// One queued demand, as published to the hardware bridge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorCommand {
    pub id: PortId,
    #[serde(flatten)]
    pub demand: Demand,
}

/// Sensor reset request, forwarded to the hardware bridge with the frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReset {
    pub id: PortId,
    pub position: f64,
}

/// Bus that batches every demand of one tick into a frame
///
/// The runtime hands it the feedback it drained from the hardware bridge
/// before the tick, and takes the resulting frame after the tick. Only the
/// last demand per device survives in a frame, so re-issuing a command within
/// a tick is harmless.
#[derive(Debug, Default)]
pub struct FrameBus {
    settings: HashMap<PortId, DeviceSettings>,
    feedback: HashMap<PortId, Feedback>,
    pending: Vec<MotorCommand>,
    resets: Vec<SensorReset>,
}

impl FrameBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store feedback reported by the hardware bridge
    pub fn apply_feedback(&mut self, id: PortId, feedback: Feedback) {
        self.feedback.insert(id, feedback);
    }

    /// Drop every cached sample; reads fail until the bridge reports again
    pub fn clear_feedback(&mut self) {
        self.feedback.clear();
    }

    /// Devices registered so far, with their settings
    pub fn devices(&self) -> impl Iterator<Item = (&PortId, &DeviceSettings)> {
        self.settings.iter()
    }

    /// Take the commands queued this tick
    pub fn take_frame(&mut self) -> (Vec<MotorCommand>, Vec<SensorReset>) {
        (
            std::mem::take(&mut self.pending),
            std::mem::take(&mut self.resets),
        )
    }

    fn check(&self, id: PortId) -> Result<()> {
        if !self.settings.contains_key(&id) {
            return Err(BusError::UnknownDevice { id });
        }
        Ok(())
    }
}

impl MotorBus for FrameBus {
    fn configure(&mut self, id: PortId, settings: &DeviceSettings) -> Result<()> {
        debug!("Configure device {}: {:?}", id, settings);
        self.settings.insert(id, settings.clone());
        Ok(())
    }

    fn send(&mut self, id: PortId, demand: Demand) -> Result<()> {
        self.check(id)?;
        // Last writer within a tick wins
        self.pending.retain(|cmd| cmd.id != id);
        self.pending.push(MotorCommand { id, demand });
        Ok(())
    }

    fn feedback(&self, id: PortId) -> Result<Feedback> {
        self.check(id)?;
        self.feedback
            .get(&id)
            .copied()
            .ok_or(BusError::NoFeedback { id })
    }

    fn set_sensor_position(&mut self, id: PortId, position: f64) -> Result<()> {
        self.check(id)?;
        self.resets.retain(|reset| reset.id != id);
        self.resets.push(SensorReset { id, position });
        // Assume the reset lands; the bridge confirms with fresh feedback
        if let Some(feedback) = self.feedback.get_mut(&id) {
            feedback.position = position;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_device_rejected() {
        let mut bus = FrameBus::new();
        let err = bus.send(3, Demand::PercentOutput(0.5)).unwrap_err();
        assert_eq!(err, BusError::UnknownDevice { id: 3 });
    }

    #[test]
    fn test_last_writer_wins_within_frame() {
        let mut bus = FrameBus::new();
        bus.configure(1, &DeviceSettings::default()).unwrap();
        bus.configure(2, &DeviceSettings::default()).unwrap();

        bus.send(1, Demand::PercentOutput(0.2)).unwrap();
        bus.send(2, Demand::Velocity(100.0)).unwrap();
        bus.send(1, Demand::PercentOutput(-0.4)).unwrap();

        let (frame, resets) = bus.take_frame();
        assert!(resets.is_empty());
        assert_eq!(frame.len(), 2, "One command per device per frame");
        let one = frame.iter().find(|cmd| cmd.id == 1).unwrap();
        assert_eq!(one.demand, Demand::PercentOutput(-0.4));

        // Frame is drained
        assert!(bus.take_frame().0.is_empty());
    }

    #[test]
    fn test_sensor_reset_updates_cached_feedback() {
        let mut bus = FrameBus::new();
        bus.configure(6, &DeviceSettings::default()).unwrap();
        bus.apply_feedback(
            6,
            Feedback {
                position: 12.0,
                velocity: 3.0,
            },
        );
        bus.set_sensor_position(6, 30.0).unwrap();
        assert_eq!(bus.feedback(6).unwrap().position, 30.0);

        let (_, resets) = bus.take_frame();
        assert_eq!(resets, vec![SensorReset { id: 6, position: 30.0 }]);
    }

    #[test]
    fn test_silent_device_has_no_feedback() {
        let mut bus = FrameBus::new();
        bus.configure(5, &DeviceSettings::default()).unwrap();
        assert_eq!(bus.feedback(5), Err(BusError::NoFeedback { id: 5 }));

        // A reset alone is not a measurement
        bus.set_sensor_position(5, 0.0).unwrap();
        assert_eq!(bus.feedback(5), Err(BusError::NoFeedback { id: 5 }));

        bus.apply_feedback(
            5,
            Feedback {
                position: 4.0,
                velocity: 0.0,
            },
        );
        assert_eq!(bus.feedback(5).unwrap().position, 4.0);
        bus.clear_feedback();
        assert_eq!(bus.feedback(5), Err(BusError::NoFeedback { id: 5 }));
    }

    #[test]
    fn test_command_json_shape() {
        let cmd = MotorCommand {
            id: 7,
            demand: Demand::Velocity(1500.0),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(json, r#"{"id":7,"mode":"velocity","value":1500.0}"#);
    }
}
