// TalonSRX-style binding (brushed motor, optional quadrature encoder)
//
// Native position unit is the sensor tick; native velocity is ticks per
// 100 ms. Open-loop output is sent as voltage referenced to a 12 V battery so
// drive feel does not sag with the battery.
//
// Without an encoder:
// - velocity requests fall back to open loop at `target / max_velocity`
// - position targets are ignored (logged once)
// - position and velocity read as unavailable

use std::cell::Cell;

use tracing::debug;

use super::{
    clamp_fraction, ActuatorPort, BusLink, Capabilities, Demand, PortConfig, PortId, Reading,
    SharedBus,
};

/// Quadrature encoder resolution used by the drive gearboxes
pub const TALON_TICKS_PER_REV: f64 = 4096.0;

/// Nominal battery voltage for open-loop output
const NOMINAL_VOLTAGE: f64 = 12.0;

/// Native velocity unit is per 100 ms; contract unit is per minute
const VELOCITY_PERIODS_PER_MINUTE: f64 = 600.0;

pub struct TalonSrxPort {
    id: PortId,
    link: BusLink,
    has_sensor: bool,
    profiled: bool,
    ticks_per_unit: f64,
    max_velocity: f64,
    warned_no_sensor: Cell<bool>,
}

impl TalonSrxPort {
    pub fn new(bus: SharedBus, config: &PortConfig, ticks_per_unit: f64) -> Self {
        Self {
            id: config.id,
            link: BusLink::open(bus, config),
            has_sensor: config.has_sensor,
            profiled: config.profile.is_some(),
            ticks_per_unit,
            max_velocity: config.max_velocity,
            warned_no_sensor: Cell::new(false),
        }
    }

    fn to_native_velocity(&self, per_minute: f64) -> f64 {
        per_minute * self.ticks_per_unit / VELOCITY_PERIODS_PER_MINUTE
    }

    fn from_native_velocity(&self, native: f64) -> f64 {
        native * VELOCITY_PERIODS_PER_MINUTE / self.ticks_per_unit
    }

    fn note_no_sensor(&self, what: &str) {
        if !self.warned_no_sensor.replace(true) {
            debug!("Actuator {} has no encoder, {} ignored", self.id, what);
        }
    }
}

impl ActuatorPort for TalonSrxPort {
    fn id(&self) -> PortId {
        self.id
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            has_position_sensor: self.has_sensor,
            has_velocity_closed_loop: self.has_sensor,
        }
    }

    fn set_open_loop(&mut self, fraction: f64) {
        self.link
            .send(Demand::Voltage(clamp_fraction(fraction) * NOMINAL_VOLTAGE));
    }

    fn set_closed_loop_velocity(&mut self, target: f64) {
        if self.has_sensor {
            self.link.send(Demand::Velocity(self.to_native_velocity(target)));
        } else if self.max_velocity > 0.0 {
            self.set_open_loop(target / self.max_velocity);
        } else {
            self.set_open_loop(0.0);
        }
    }

    fn set_position_target(&mut self, target: f64) {
        if !self.has_sensor {
            self.note_no_sensor("position target");
            return;
        }
        let ticks = target * self.ticks_per_unit;
        let demand = if self.profiled {
            Demand::MotionProfile(ticks)
        } else {
            Demand::Position(ticks)
        };
        self.link.send(demand);
    }

    fn position(&self) -> Reading {
        if !self.has_sensor {
            return Reading::UNAVAILABLE;
        }
        self.link.feedback().map_or(Reading::UNAVAILABLE, |fb| {
            Reading::measured(fb.position / self.ticks_per_unit)
        })
    }

    fn velocity(&self) -> Reading {
        if !self.has_sensor {
            return Reading::UNAVAILABLE;
        }
        self.link.feedback().map_or(Reading::UNAVAILABLE, |fb| {
            Reading::measured(self.from_native_velocity(fb.velocity))
        })
    }

    fn reset_position_to(&mut self, position: f64) {
        if !self.has_sensor {
            self.note_no_sensor("sensor reset");
            return;
        }
        self.link.set_sensor_position(position * self.ticks_per_unit);
    }

    fn stop(&mut self) {
        self.link.send(Demand::Neutral);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::actuator::{build_port, MotorFamily, SimBus};

    fn drive_port(has_sensor: bool) -> (Rc<RefCell<SimBus>>, Box<dyn ActuatorPort>) {
        let sim = Rc::new(RefCell::new(SimBus::new()));
        let bus: SharedBus = sim.clone();
        let config = PortConfig {
            has_sensor,
            max_velocity: 5000.0,
            ..PortConfig::open_loop(
                2,
                MotorFamily::TalonSrx {
                    ticks_per_unit: TALON_TICKS_PER_REV,
                },
                true,
            )
        };
        (sim, build_port(&bus, &config))
    }

    #[test]
    fn test_velocity_converted_to_ticks_per_100ms() {
        let (sim, mut port) = drive_port(true);
        port.set_closed_loop_velocity(600.0);
        // 600 rev/min = 10 rev/s = 1 rev per 100 ms
        assert_eq!(sim.borrow().demand(2), Some(Demand::Velocity(4096.0)));
    }

    #[test]
    fn test_velocity_degrades_to_open_loop_without_encoder() {
        let (sim, mut port) = drive_port(false);
        port.set_closed_loop_velocity(2500.0);
        // Half of max velocity -> half of nominal voltage
        assert_eq!(sim.borrow().demand(2), Some(Demand::Voltage(6.0)));
        assert!(!port.capabilities().has_velocity_closed_loop);
    }

    #[test]
    fn test_position_target_is_noop_without_encoder() {
        let (sim, mut port) = drive_port(false);
        port.set_position_target(-25.0);
        assert_eq!(
            sim.borrow().demand(2),
            Some(Demand::Neutral),
            "Device should still hold its initial neutral demand"
        );
        assert_eq!(port.position(), Reading::UNAVAILABLE);
        assert_eq!(port.velocity(), Reading::UNAVAILABLE);
    }

    #[test]
    fn test_position_in_rotations() {
        let (sim, mut port) = drive_port(true);
        port.set_position_target(2.0);
        assert_eq!(sim.borrow().demand(2), Some(Demand::Position(8192.0)));

        sim.borrow_mut().place(2, 2048.0);
        assert_eq!(port.position(), Reading::measured(0.5));
    }
}
