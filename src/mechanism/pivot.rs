// Shooter pivot: profiled arm moves between the shot and intake angles
//
// Positions are raw encoder counts, increasing from the stowed high shot
// toward the intake floor position.

use tracing::debug;

use super::{MechanismSetpoint, PositionMechanism};
use crate::actuator::{build_port, ActuatorPort, PortId, SharedBus};
use crate::config::PivotConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotPosition {
    ShootingHigh,
    ShootingLow,
    Intake,
}

pub struct Pivot {
    mechanism: PositionMechanism,
    high: MechanismSetpoint,
    low: MechanismSetpoint,
    intake: MechanismSetpoint,
}

impl Pivot {
    pub fn from_config(bus: &SharedBus, config: &PivotConfig) -> Self {
        let port = config
            .enabled
            .then(|| build_port(bus, &config.port_config()));
        Self::new(port, config)
    }

    /// Wrap an already-built port; the sensor is zeroed at the stowed position
    pub fn new(port: Option<Box<dyn ActuatorPort>>, config: &PivotConfig) -> Self {
        let tolerance = config.position_tolerance;
        let setpoints = &config.setpoints;
        let mut pivot = Self {
            mechanism: PositionMechanism::new("Pivot", port),
            high: MechanismSetpoint::new("Shooting High", setpoints.shooting_high, tolerance),
            low: MechanismSetpoint::new("Shooting Low", setpoints.shooting_low, tolerance),
            intake: MechanismSetpoint::new("Intake", setpoints.intake, tolerance),
        };
        pivot.mechanism.reset_position_to(0.0);
        pivot
    }

    pub fn setpoint(&self, which: PivotPosition) -> &MechanismSetpoint {
        match which {
            PivotPosition::ShootingHigh => &self.high,
            PivotPosition::ShootingLow => &self.low,
            PivotPosition::Intake => &self.intake,
        }
    }

    pub fn move_to(&mut self, which: PivotPosition) {
        let setpoint = *self.setpoint(which);
        self.mechanism.move_to(&setpoint);
    }

    pub fn is_at(&self, which: PivotPosition) -> bool {
        self.mechanism.is_at(self.setpoint(which))
    }

    /// Further along than `which` (toward intake)
    pub fn is_past(&self, which: PivotPosition) -> bool {
        self.mechanism.is_above(self.setpoint(which).position)
    }

    /// Not yet as far as `which` (toward stowed)
    pub fn is_short_of(&self, which: PivotPosition) -> bool {
        self.mechanism.is_below(self.setpoint(which).position)
    }

    pub fn position(&self) -> f64 {
        self.mechanism.position()
    }

    pub fn stop(&mut self) {
        self.mechanism.stop();
    }

    /// Stop and declare the current angle to be zero
    pub fn rezero(&mut self) {
        if !self.mechanism.is_enabled() {
            return;
        }
        self.mechanism.stop();
        self.mechanism.reset_position_to(0.0);
        debug!("Pivot re-zeroed");
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
