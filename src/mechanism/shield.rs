// Note shield in front of the shooter
//
// Plain position control, no motion profile. The sensor is seeded to the
// resting position at boot since the shield powers up at mid.

use super::{MechanismSetpoint, PositionMechanism};
use crate::actuator::{build_port, ActuatorPort, PortId, SharedBus};
use crate::config::ShieldConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShieldPosition {
    Down,
    Mid,
    Up,
}

pub struct Shield {
    mechanism: PositionMechanism,
    down: MechanismSetpoint,
    mid: MechanismSetpoint,
    up: MechanismSetpoint,
    stow_guard: f64,
}

impl Shield {
    pub fn from_config(bus: &SharedBus, config: &ShieldConfig) -> Self {
        let port = config
            .enabled
            .then(|| build_port(bus, &config.port_config()));
        Self::new(port, config)
    }

    pub fn new(port: Option<Box<dyn ActuatorPort>>, config: &ShieldConfig) -> Self {
        let tolerance = config.position_tolerance;
        let setpoints = &config.setpoints;
        let mut shield = Self {
            mechanism: PositionMechanism::new("Shield", port),
            down: MechanismSetpoint::new("Shield Down", setpoints.down, tolerance),
            mid: MechanismSetpoint::new("Shield Mid", setpoints.mid, tolerance),
            up: MechanismSetpoint::new("Shield Up", setpoints.up, tolerance),
            stow_guard: config.stow_guard,
        };
        shield.mechanism.reset_position_to(config.initial_position);
        shield
    }

    pub fn setpoint(&self, which: ShieldPosition) -> &MechanismSetpoint {
        match which {
            ShieldPosition::Down => &self.down,
            ShieldPosition::Mid => &self.mid,
            ShieldPosition::Up => &self.up,
        }
    }

    pub fn move_to(&mut self, which: ShieldPosition) {
        let setpoint = *self.setpoint(which);
        self.mechanism.move_to(&setpoint);
    }

    pub fn is_at(&self, which: ShieldPosition) -> bool {
        self.mechanism.is_at(self.setpoint(which))
    }

    /// Shield reads under the guard value below which stowing may move it
    pub fn is_within_stow_guard(&self) -> bool {
        self.mechanism.is_below(self.stow_guard)
    }

    pub fn position(&self) -> f64 {
        self.mechanism.position()
    }

    pub fn stop(&mut self) {
        self.mechanism.stop();
    }

    pub fn target(&self) -> Option<&'static str> {
        self.mechanism.target()
    }

    pub fn is_enabled(&self) -> bool {
        self.mechanism.is_enabled()
    }

    pub fn port_ids(&self) -> Vec<PortId> {
        self.mechanism.port_ids()
    }

    pub fn stop_port(&mut self, id: PortId) -> bool {
        self.mechanism.stop_port(id)
    }
}
