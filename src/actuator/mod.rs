// Actuator ports for every controllable mechanism
//
// Provides:
// - The `ActuatorPort` capability contract (units fixed by the contract)
// - Two motor-family bindings (SparkMax-style smart motor, TalonSRX-style
//   brushed motor with optional encoder)
// - The motor bus they talk through, plus an in-process simulation
//
// Bindings absorb bus failures: a failed command is logged and dropped for
// that tick, a failed read reports the value as unavailable.

pub mod bus;
pub mod sim;
mod spark;
mod talon;

use std::cell::Cell;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use bus::{
    BusError, Demand, DeviceSettings, Feedback, FrameBus, Gains, MotorBus, MotorCommand,
    ProfileLimits, SensorReset, SharedBus,
};
pub use sim::SimBus;
pub use spark::SparkMaxPort;
pub use talon::{TalonSrxPort, TALON_TICKS_PER_REV};

/// Stable actuator identity (the device's bus id)
pub type PortId = u8;

/// What the hardware behind a port can do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub has_position_sensor: bool,
    pub has_velocity_closed_loop: bool,
}

/// A sensor read that may not be backed by hardware
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub available: bool,
}

impl Reading {
    pub const UNAVAILABLE: Reading = Reading {
        value: 0.0,
        available: false,
    };

    pub fn measured(value: f64) -> Self {
        Self {
            value,
            available: true,
        }
    }
}

/// Hardware-agnostic handle to one controllable motor
///
/// Units are fixed by the contract: open-loop output is a fraction in
/// [-1, 1], positions are in the port's configured unit (rotations for drive
/// wheels, sensor counts for arms), velocities in units per minute.
///
/// No method returns an error. A binding that cannot reach its hardware logs
/// and drops the command; the control loop never waits on actuator I/O.
pub trait ActuatorPort {
    fn id(&self) -> PortId;

    fn capabilities(&self) -> Capabilities;

    /// Immediate open-loop output. Safe to call every tick.
    fn set_open_loop(&mut self, fraction: f64);

    /// Closed-loop velocity tracking.
    ///
    /// Without a velocity sensor the binding approximates this with open-loop
    /// output `target / max_velocity`. That degraded mode is intentional.
    fn set_closed_loop_velocity(&mut self, target: f64);

    /// Profiled move to an absolute position.
    ///
    /// Without a position sensor this is a no-op.
    fn set_position_target(&mut self, target: f64);

    fn position(&self) -> Reading;

    fn velocity(&self) -> Reading;

    /// Overwrite the sensor's current position
    fn reset_position_to(&mut self, position: f64);

    fn reset_position(&mut self) {
        self.reset_position_to(0.0);
    }

    fn stop(&mut self);
}

/// Motor family behind a port, chosen once at startup from configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorFamily {
    /// Brushless motor with integrated encoder and on-board closed loop
    SparkMax,
    /// Brushed motor controller; encoder optional
    TalonSrx {
        /// Native sensor ticks per contract position unit
        ticks_per_unit: f64,
    },
}

/// Everything needed to bring up one port
#[derive(Debug, Clone, PartialEq)]
pub struct PortConfig {
    pub id: PortId,
    pub family: MotorFamily,
    pub has_sensor: bool,
    pub inverted: bool,
    pub sensor_phase: bool,
    pub ramp_rate: f64,
    pub peak_output_forward: f64,
    pub peak_output_reverse: f64,
    pub gains: Gains,
    pub profile: Option<ProfileLimits>,
    /// Velocity reached at full output, used by the open-loop fallback
    pub max_velocity: f64,
}

impl PortConfig {
    /// Open-loop port with no sensor and default limits
    pub fn open_loop(id: PortId, family: MotorFamily, inverted: bool) -> Self {
        Self {
            id,
            family,
            has_sensor: false,
            inverted,
            sensor_phase: false,
            ramp_rate: 0.0,
            peak_output_forward: 1.0,
            peak_output_reverse: -1.0,
            gains: Gains::default(),
            profile: None,
            max_velocity: 1.0,
        }
    }

    fn device_settings(&self) -> DeviceSettings {
        DeviceSettings {
            inverted: self.inverted,
            sensor_phase: self.sensor_phase,
            ramp_rate: self.ramp_rate,
            peak_output_forward: self.peak_output_forward,
            peak_output_reverse: self.peak_output_reverse,
            gains: self.gains,
            profile: self.profile,
            has_sensor: self.has_sensor,
        }
    }
}

/// Build the binding for a port's motor family and configure the device
pub fn build_port(bus: &SharedBus, config: &PortConfig) -> Box<dyn ActuatorPort> {
    match config.family {
        MotorFamily::SparkMax => Box::new(SparkMaxPort::new(bus.clone(), config)),
        MotorFamily::TalonSrx { ticks_per_unit } => {
            Box::new(TalonSrxPort::new(bus.clone(), config, ticks_per_unit))
        }
    }
}

/// Clamp an open-loop request into [-1, 1]; non-finite requests become 0
pub(crate) fn clamp_fraction(fraction: f64) -> f64 {
    if fraction.is_finite() {
        fraction.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// A binding's connection to the bus, with fault bookkeeping
///
/// Logs once when a device starts failing and once when it recovers, so a
/// dead device does not flood the log at the loop rate.
pub(crate) struct BusLink {
    id: PortId,
    bus: SharedBus,
    faulted: Cell<bool>,
}

impl BusLink {
    pub(crate) fn open(bus: SharedBus, config: &PortConfig) -> Self {
        let link = Self {
            id: config.id,
            bus,
            faulted: Cell::new(false),
        };
        let result = link.bus.borrow_mut().configure(config.id, &config.device_settings());
        link.record(result);
        link
    }

    pub(crate) fn send(&self, demand: Demand) {
        let result = self.bus.borrow_mut().send(self.id, demand);
        self.record(result);
    }

    /// Latest feedback; a device that has not reported yet is not a fault
    pub(crate) fn feedback(&self) -> Option<Feedback> {
        match self.bus.borrow().feedback(self.id) {
            Err(BusError::NoFeedback { .. }) => None,
            result => self.record(result),
        }
    }

    pub(crate) fn set_sensor_position(&self, position: f64) {
        let result = self.bus.borrow_mut().set_sensor_position(self.id, position);
        self.record(result);
    }

    fn record<T>(&self, result: Result<T, BusError>) -> Option<T> {
        match result {
            Ok(value) => {
                if self.faulted.replace(false) {
                    info!("Actuator {} recovered", self.id);
                }
                Some(value)
            }
            Err(e) => {
                if !self.faulted.replace(true) {
                    warn!("Actuator {} fault, dropping commands: {}", self.id, e);
                }
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Recording port used by controller and sequencer tests

    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum Call {
        OpenLoop(f64),
        Velocity(f64),
        Position(f64),
        Reset(f64),
        Stop,
    }

    #[derive(Debug, Default)]
    pub struct MockState {
        pub calls: Vec<Call>,
        pub position: f64,
        pub velocity: f64,
    }

    impl MockState {
        pub fn stops(&self) -> usize {
            self.calls.iter().filter(|c| **c == Call::Stop).count()
        }

        pub fn last(&self) -> Option<Call> {
            self.calls.last().copied()
        }
    }

    pub struct MockPort {
        pub id: PortId,
        pub caps: Capabilities,
        pub state: Rc<RefCell<MockState>>,
    }

    impl MockPort {
        pub fn new(id: PortId, sensing: bool) -> (Self, Rc<RefCell<MockState>>) {
            let state = Rc::new(RefCell::new(MockState::default()));
            let port = Self {
                id,
                caps: Capabilities {
                    has_position_sensor: sensing,
                    has_velocity_closed_loop: sensing,
                },
                state: state.clone(),
            };
            (port, state)
        }
    }

    impl ActuatorPort for MockPort {
        fn id(&self) -> PortId {
            self.id
        }

        fn capabilities(&self) -> Capabilities {
            self.caps
        }

        fn set_open_loop(&mut self, fraction: f64) {
            self.state.borrow_mut().calls.push(Call::OpenLoop(fraction));
        }

        fn set_closed_loop_velocity(&mut self, target: f64) {
            self.state.borrow_mut().calls.push(Call::Velocity(target));
        }

        fn set_position_target(&mut self, target: f64) {
            if self.caps.has_position_sensor {
                self.state.borrow_mut().calls.push(Call::Position(target));
            }
        }

        fn position(&self) -> Reading {
            if self.caps.has_position_sensor {
                Reading::measured(self.state.borrow().position)
            } else {
                Reading::UNAVAILABLE
            }
        }

        fn velocity(&self) -> Reading {
            if self.caps.has_velocity_closed_loop {
                Reading::measured(self.state.borrow().velocity)
            } else {
                Reading::UNAVAILABLE
            }
        }

        fn reset_position_to(&mut self, position: f64) {
            let mut state = self.state.borrow_mut();
            state.calls.push(Call::Reset(position));
            state.position = position;
        }

        fn stop(&mut self) {
            self.state.borrow_mut().calls.push(Call::Stop);
        }
    }
}
