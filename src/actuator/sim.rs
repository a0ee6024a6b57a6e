// In-process simulated motor bus
//
// First-order motor model good enough to exercise the control loop without
// hardware: open-loop output maps to a free speed, velocity demands are
// tracked with a time constant, position demands move toward the target at
// the configured cruise velocity.

use std::collections::{HashMap, HashSet};

use super::PortId;
use super::bus::{BusError, Demand, DeviceSettings, Feedback, MotorBus, Result};

/// Native velocity reached at full open-loop output
pub const DEFAULT_FREE_SPEED: f64 = 5000.0;

/// Fallback slew rate for position demands with no profile configured
const DEFAULT_POSITION_SLEW: f64 = 50_000.0;

/// Velocity time constant, seconds
const TIME_CONSTANT: f64 = 0.05;

/// Nominal battery voltage used to turn voltage demands into duty cycle
const NOMINAL_VOLTAGE: f64 = 12.0;

#[derive(Debug, Clone)]
struct SimMotor {
    settings: DeviceSettings,
    demand: Demand,
    position: f64,
    velocity: f64,
    stop_count: usize,
}

/// Simulated bus with failure injection
#[derive(Debug)]
pub struct SimBus {
    motors: HashMap<PortId, SimMotor>,
    failing: HashSet<PortId>,
    free_speed: f64,
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBus {
    pub fn new() -> Self {
        Self::with_free_speed(DEFAULT_FREE_SPEED)
    }

    pub fn with_free_speed(free_speed: f64) -> Self {
        Self {
            motors: HashMap::new(),
            failing: HashSet::new(),
            free_speed,
        }
    }

    /// Make every call for `id` fail until cleared
    pub fn fail_device(&mut self, id: PortId, failing: bool) {
        if failing {
            self.failing.insert(id);
        } else {
            self.failing.remove(&id);
        }
    }

    /// Last demand received by a device
    pub fn demand(&self, id: PortId) -> Option<Demand> {
        self.motors.get(&id).map(|m| m.demand)
    }

    /// Number of neutral demands received by a device
    pub fn stop_count(&self, id: PortId) -> usize {
        self.motors.get(&id).map_or(0, |m| m.stop_count)
    }

    /// Settings pushed to a device at configuration time
    pub fn settings(&self, id: PortId) -> Option<&DeviceSettings> {
        self.motors.get(&id).map(|m| &m.settings)
    }

    /// Force a device's sensor to a value (test fixture)
    pub fn place(&mut self, id: PortId, position: f64) {
        if let Some(motor) = self.motors.get_mut(&id) {
            motor.position = position;
        }
    }

    /// Advance the simulation by `dt` seconds
    pub fn step(&mut self, dt: f64) {
        let free_speed = self.free_speed;
        for motor in self.motors.values_mut() {
            let target_velocity = match motor.demand {
                Demand::PercentOutput(fraction) => fraction.clamp(-1.0, 1.0) * free_speed,
                Demand::Voltage(volts) => (volts / NOMINAL_VOLTAGE).clamp(-1.0, 1.0) * free_speed,
                Demand::Velocity(velocity) => velocity,
                Demand::Neutral => 0.0,
                Demand::Position(target) | Demand::MotionProfile(target) => {
                    let slew = motor
                        .settings
                        .profile
                        .map_or(DEFAULT_POSITION_SLEW, |p| p.cruise_velocity);
                    let error = target - motor.position;
                    let max_step = slew * dt;
                    let step = error.clamp(-max_step, max_step);
                    motor.position += step;
                    motor.velocity = if dt > 0.0 { step / dt } else { 0.0 };
                    continue;
                }
            };

            let alpha = (dt / TIME_CONSTANT).min(1.0);
            motor.velocity += (target_velocity - motor.velocity) * alpha;
            motor.position += motor.velocity * dt;
        }
    }

    fn motor(&self, id: PortId) -> Result<&SimMotor> {
        if self.failing.contains(&id) {
            return Err(BusError::NotResponding { id });
        }
        self.motors.get(&id).ok_or(BusError::UnknownDevice { id })
    }

    fn motor_mut(&mut self, id: PortId) -> Result<&mut SimMotor> {
        if self.failing.contains(&id) {
            return Err(BusError::NotResponding { id });
        }
        self.motors
            .get_mut(&id)
            .ok_or(BusError::UnknownDevice { id })
    }
}

impl MotorBus for SimBus {
    fn configure(&mut self, id: PortId, settings: &DeviceSettings) -> Result<()> {
        // The device exists even if it is down right now, so it can recover
        self.motors.insert(
            id,
            SimMotor {
                settings: settings.clone(),
                demand: Demand::Neutral,
                position: 0.0,
                velocity: 0.0,
                stop_count: 0,
            },
        );
        if self.failing.contains(&id) {
            return Err(BusError::NotResponding { id });
        }
        Ok(())
    }

    fn send(&mut self, id: PortId, demand: Demand) -> Result<()> {
        let motor = self.motor_mut(id)?;
        if demand == Demand::Neutral {
            motor.stop_count += 1;
        }
        motor.demand = demand;
        Ok(())
    }

    fn feedback(&self, id: PortId) -> Result<Feedback> {
        let motor = self.motor(id)?;
        Ok(Feedback {
            position: motor.position,
            velocity: motor.velocity,
        })
    }

    fn set_sensor_position(&mut self, id: PortId, position: f64) -> Result<()> {
        self.motor_mut(id)?.position = position;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::bus::ProfileLimits;

    #[test]
    fn test_open_loop_reaches_free_speed() {
        let mut bus = SimBus::with_free_speed(1000.0);
        bus.configure(1, &DeviceSettings::default()).unwrap();
        bus.send(1, Demand::PercentOutput(0.5)).unwrap();
        for _ in 0..100 {
            bus.step(0.02);
        }
        let fb = bus.feedback(1).unwrap();
        assert!(
            (fb.velocity - 500.0).abs() < 1.0,
            "Velocity {} should settle at half free speed",
            fb.velocity
        );
        assert!(fb.position > 0.0);
    }

    #[test]
    fn test_position_demand_is_slew_limited() {
        let mut bus = SimBus::new();
        let settings = DeviceSettings {
            profile: Some(ProfileLimits {
                cruise_velocity: 100.0,
                acceleration: 100.0,
                smoothing: 0,
            }),
            ..DeviceSettings::default()
        };
        bus.configure(2, &settings).unwrap();
        bus.send(2, Demand::MotionProfile(10.0)).unwrap();

        bus.step(0.05);
        assert!((bus.feedback(2).unwrap().position - 5.0).abs() < 1e-9);
        bus.step(0.05);
        bus.step(0.05);
        assert!((bus.feedback(2).unwrap().position - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_failing_device_reports_error() {
        let mut bus = SimBus::new();
        bus.configure(4, &DeviceSettings::default()).unwrap();
        bus.fail_device(4, true);
        assert_eq!(
            bus.send(4, Demand::Neutral),
            Err(BusError::NotResponding { id: 4 })
        );
        bus.fail_device(4, false);
        assert!(bus.send(4, Demand::Neutral).is_ok());
        assert_eq!(bus.stop_count(4), 1);
    }

    #[test]
    fn test_device_down_at_configure_recovers() {
        let mut bus = SimBus::new();
        bus.fail_device(3, true);
        assert_eq!(
            bus.configure(3, &DeviceSettings::default()),
            Err(BusError::NotResponding { id: 3 })
        );
        assert_eq!(bus.feedback(3), Err(BusError::NotResponding { id: 3 }));

        bus.fail_device(3, false);
        bus.send(3, Demand::PercentOutput(0.25)).unwrap();
        assert_eq!(bus.demand(3), Some(Demand::PercentOutput(0.25)));
        assert!(bus.feedback(3).is_ok());
    }
}
