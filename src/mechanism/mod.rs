// Single-port mechanisms with named setpoints
//
// Provides:
// - `PositionMechanism`, the shared core (move, stop, tolerance checks)
// - Pivot (shooter angle) and Shield wrappers with their named setpoints
// - The shooter/feeder pair
//
// A disabled mechanism owns no port. Mutators are no-ops and queries answer
// so that a routine waiting on the mechanism proceeds at once.

pub mod pivot;
pub mod shield;
pub mod shooter;

use tracing::info;

use crate::actuator::{ActuatorPort, PortId};

pub use pivot::{Pivot, PivotPosition};
pub use shield::{Shield, ShieldPosition};
pub use shooter::{RollerSpeeds, ShooterFeeder};

/// Named position target plus the tolerance used to call it reached
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MechanismSetpoint {
    pub name: &'static str,
    pub position: f64,
    pub tolerance: f64,
}

impl MechanismSetpoint {
    pub fn new(name: &'static str, position: f64, tolerance: f64) -> Self {
        debug_assert!(tolerance > 0.0, "setpoint {} has tolerance {}", name, tolerance);
        Self {
            name,
            position,
            tolerance,
        }
    }

    pub fn contains(&self, position: f64) -> bool {
        (position - self.position).abs() < self.tolerance
    }
}

pub struct PositionMechanism {
    port: Option<Box<dyn ActuatorPort>>,
    target: Option<&'static str>,
}

impl PositionMechanism {
    pub fn new(name: &'static str, port: Option<Box<dyn ActuatorPort>>) -> Self {
        if port.is_none() {
            info!("{} disabled, commands will be ignored", name);
        }
        Self { port, target: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.port.is_some()
    }

    pub fn move_to(&mut self, setpoint: &MechanismSetpoint) {
        let Some(port) = self.port.as_mut() else {
            return;
        };
        port.set_position_target(setpoint.position);
        self.target = Some(setpoint.name);
    }

    pub fn stop(&mut self) {
        if let Some(port) = self.port.as_mut() {
            port.stop();
        }
        self.target = None;
    }

    /// Current position; 0 when disabled or the reading is unavailable
    pub fn position(&self) -> f64 {
        self.port
            .as_ref()
            .map(|port| port.position())
            .filter(|reading| reading.available)
            .map_or(0.0, |reading| reading.value)
    }

    fn measured(&self) -> Option<f64> {
        let reading = self.port.as_ref()?.position();
        reading.available.then_some(reading.value)
    }

    /// Within tolerance of `setpoint`. True when nothing can be measured.
    pub fn is_at(&self, setpoint: &MechanismSetpoint) -> bool {
        self.measured().is_none_or(|position| setpoint.contains(position))
    }

    /// Position strictly above `threshold`. True when nothing can be measured.
    pub fn is_above(&self, threshold: f64) -> bool {
        self.measured().is_none_or(|position| position > threshold)
    }

    /// Position strictly below `threshold`. True when nothing can be measured.
    pub fn is_below(&self, threshold: f64) -> bool {
        self.measured().is_none_or(|position| position < threshold)
    }

    pub fn reset_position_to(&mut self, position: f64) {
        if let Some(port) = self.port.as_mut() {
            port.reset_position_to(position);
        }
    }

    /// Name of the last setpoint commanded, if still holding one
    pub fn target(&self) -> Option<&'static str> {
        self.target
    }

    /// Ports owned by this mechanism (empty when disabled)
    pub fn port_ids(&self) -> Vec<PortId> {
        self.port.iter().map(|port| port.id()).collect()
    }

    pub fn stop_port(&mut self, id: PortId) -> bool {
        match self.port.as_ref() {
            Some(port) if port.id() == id => {
                self.stop();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::mock::{Call, MockPort};

    fn arm() -> MechanismSetpoint {
        MechanismSetpoint::new("Arm", 100.0, 5.0)
    }

    #[test]
    fn test_setpoint_tolerance_is_strict() {
        let setpoint = arm();
        assert!(setpoint.contains(104.9));
        assert!(setpoint.contains(95.1));
        assert!(!setpoint.contains(105.0), "Boundary is outside");
    }

    #[test]
    fn test_move_and_query() {
        let (port, state) = MockPort::new(5, true);
        let mut mech = PositionMechanism::new("Arm", Some(Box::new(port)));

        mech.move_to(&arm());
        assert_eq!(state.borrow().last(), Some(Call::Position(100.0)));
        assert_eq!(mech.target(), Some("Arm"));
        assert!(!mech.is_at(&arm()));

        state.borrow_mut().position = 98.0;
        assert!(mech.is_at(&arm()));
        assert!(mech.is_above(50.0));
        assert!(!mech.is_below(50.0));
        assert_eq!(mech.position(), 98.0);
    }

    #[test]
    fn test_disabled_mechanism_never_blocks() {
        let mut mech = PositionMechanism::new("Arm", None);
        mech.move_to(&arm());
        mech.stop();
        mech.reset_position_to(3.0);

        assert!(!mech.is_enabled());
        assert_eq!(mech.position(), 0.0);
        assert!(mech.is_at(&arm()));
        assert!(mech.is_above(1e9));
        assert!(mech.is_below(-1e9));
        assert!(mech.port_ids().is_empty());
        assert!(!mech.stop_port(5));
    }

    #[test]
    fn test_stop_port_matches_own_id() {
        let (port, state) = MockPort::new(6, true);
        let mut mech = PositionMechanism::new("Arm", Some(Box::new(port)));
        assert!(!mech.stop_port(5));
        assert!(mech.stop_port(6));
        assert_eq!(state.borrow().stops(), 1);
    }
}
