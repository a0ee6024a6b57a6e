// Flywheel shooter and note feeder
//
// Two physically separate open-loop ports treated as one subsystem. The last
// commanded output of each is kept so telemetry and routines can tell whether
// the pair is running without a velocity sensor.

use tracing::info;

use crate::actuator::{build_port, ActuatorPort, PortId, SharedBus};
use crate::config::ShooterConfig;

struct Roller {
    port: Box<dyn ActuatorPort>,
    output: f64,
}

impl Roller {
    fn new(port: Box<dyn ActuatorPort>) -> Self {
        Self { port, output: 0.0 }
    }

    fn spin(&mut self, speed: f64) {
        self.port.set_open_loop(speed);
        self.output = speed;
    }

    fn stop(&mut self) {
        self.port.stop();
        self.output = 0.0;
    }
}

/// Named open-loop speeds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollerSpeeds {
    pub shooter: f64,
    pub shooter_reverse: f64,
    pub feeder: f64,
    pub feeder_reverse: f64,
}

impl From<&ShooterConfig> for RollerSpeeds {
    fn from(config: &ShooterConfig) -> Self {
        Self {
            shooter: config.shooter_speed,
            shooter_reverse: config.shooter_reverse_speed,
            feeder: config.feeder_speed,
            feeder_reverse: config.feeder_reverse_speed,
        }
    }
}

pub struct ShooterFeeder {
    // None when the subsystem is disabled
    rollers: Option<(Roller, Roller)>,
    speeds: RollerSpeeds,
}

impl ShooterFeeder {
    pub fn from_config(bus: &SharedBus, config: &ShooterConfig) -> Self {
        let ports = config.enabled.then(|| {
            let (shooter, feeder) = config.port_configs();
            (build_port(bus, &shooter), build_port(bus, &feeder))
        });
        if ports.is_none() {
            info!("Shooter disabled, commands will be ignored");
        }
        Self::new(ports, RollerSpeeds::from(config))
    }

    pub fn new(
        ports: Option<(Box<dyn ActuatorPort>, Box<dyn ActuatorPort>)>,
        speeds: RollerSpeeds,
    ) -> Self {
        Self {
            rollers: ports.map(|(shooter, feeder)| (Roller::new(shooter), Roller::new(feeder))),
            speeds,
        }
    }

    pub fn spin_shooter(&mut self, speed: f64) {
        if let Some((shooter, _)) = self.rollers.as_mut() {
            shooter.spin(speed);
        }
    }

    pub fn run_feeder(&mut self, speed: f64) {
        if let Some((_, feeder)) = self.rollers.as_mut() {
            feeder.spin(speed);
        }
    }

    pub fn spin_up(&mut self) {
        self.spin_shooter(self.speeds.shooter);
    }

    pub fn spin_reverse(&mut self) {
        self.spin_shooter(self.speeds.shooter_reverse);
    }

    pub fn feed(&mut self) {
        self.run_feeder(self.speeds.feeder);
    }

    pub fn feed_reverse(&mut self) {
        self.run_feeder(self.speeds.feeder_reverse);
    }

    pub fn stop_shooter(&mut self) {
        if let Some((shooter, _)) = self.rollers.as_mut() {
            shooter.stop();
        }
    }

    pub fn stop_feeder(&mut self) {
        if let Some((_, feeder)) = self.rollers.as_mut() {
            feeder.stop();
        }
    }

    pub fn stop_all(&mut self) {
        self.stop_shooter();
        self.stop_feeder();
    }

    /// Last commanded shooter output (0 when disabled)
    pub fn shooter_output(&self) -> f64 {
        self.rollers.as_ref().map_or(0.0, |(shooter, _)| shooter.output)
    }

    pub fn feeder_output(&self) -> f64 {
        self.rollers.as_ref().map_or(0.0, |(_, feeder)| feeder.output)
    }

    pub fn is_stopped(&self) -> bool {
        self.shooter_output() == 0.0 && self.feeder_output() == 0.0
    }

    pub fn is_enabled(&self) -> bool {
        self.rollers.is_some()
    }

    pub fn shooter_port_ids(&self) -> Vec<PortId> {
        self.rollers.iter().map(|(shooter, _)| shooter.port.id()).collect()
    }

    pub fn feeder_port_ids(&self) -> Vec<PortId> {
        self.rollers.iter().map(|(_, feeder)| feeder.port.id()).collect()
    }

    pub fn port_ids(&self) -> Vec<PortId> {
        let mut ids = self.shooter_port_ids();
        ids.extend(self.feeder_port_ids());
        ids
    }

    pub fn stop_port(&mut self, id: PortId) -> bool {
        let Some((shooter, feeder)) = self.rollers.as_mut() else {
            return false;
        };
        if shooter.port.id() == id {
            shooter.stop();
            true
        } else if feeder.port.id() == id {
            feeder.stop();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::actuator::mock::{Call, MockPort, MockState};

    fn shooter() -> (ShooterFeeder, Rc<RefCell<MockState>>, Rc<RefCell<MockState>>) {
        let (shooter, shooter_state) = MockPort::new(8, false);
        let (feeder, feeder_state) = MockPort::new(7, false);
        let speeds = RollerSpeeds::from(&ShooterConfig::default());
        (
            ShooterFeeder::new(Some((Box::new(shooter), Box::new(feeder))), speeds),
            shooter_state,
            feeder_state,
        )
    }

    #[test]
    fn test_named_speeds() {
        let (mut rollers, shooter, feeder) = shooter();
        rollers.spin_reverse();
        rollers.feed_reverse();
        assert_eq!(shooter.borrow().last(), Some(Call::OpenLoop(-0.8)));
        assert_eq!(feeder.borrow().last(), Some(Call::OpenLoop(-0.6)));

        rollers.spin_up();
        rollers.feed();
        assert_eq!(rollers.shooter_output(), 1.0);
        assert_eq!(rollers.feeder_output(), 1.0);
        assert!(!rollers.is_stopped());
    }

    #[test]
    fn test_independent_stops() {
        let (mut rollers, shooter, feeder) = shooter();
        rollers.spin_up();
        rollers.feed();
        rollers.stop_feeder();
        assert_eq!(rollers.shooter_output(), 1.0);
        assert_eq!(feeder.borrow().stops(), 1);
        assert_eq!(shooter.borrow().stops(), 0);

        rollers.stop_all();
        assert!(rollers.is_stopped());
    }

    #[test]
    fn test_stop_port_routes_by_id() {
        let (mut rollers, shooter, feeder) = shooter();
        assert_eq!(rollers.port_ids(), vec![8, 7]);
        assert!(rollers.stop_port(7));
        assert!(!rollers.stop_port(5));
        assert_eq!(feeder.borrow().stops(), 1);
        assert_eq!(shooter.borrow().stops(), 0);
    }

    #[test]
    fn test_disabled_is_silent() {
        let speeds = RollerSpeeds::from(&ShooterConfig::default());
        let mut rollers = ShooterFeeder::new(None, speeds);
        rollers.spin_up();
        rollers.feed();
        assert!(rollers.is_stopped());
        assert!(rollers.port_ids().is_empty());
    }
}
