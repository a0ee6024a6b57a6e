// Everything routines act on, plus the node factories they are built from
//
// Each factory records the ports its action writes to, so cancelling a
// routine built from them stops exactly the hardware it touched.

use tracing::warn;

use crate::actuator::{PortId, SharedBus};
use crate::config::RobotConfig;
use crate::drive::DrivetrainController;
use crate::mechanism::{Pivot, PivotPosition, Shield, ShieldPosition, ShooterFeeder};
use crate::sequencer::{action, sequence, wait_until, PortStopper, SequenceNode};

pub type Node = SequenceNode<Subsystems>;

pub struct Subsystems {
    pub drive: DrivetrainController,
    pub pivot: Pivot,
    pub shield: Shield,
    pub shooter: ShooterFeeder,
}

impl Subsystems {
    /// Construct every controller and push its device settings to the bus
    pub fn from_config(bus: &SharedBus, config: &RobotConfig) -> Self {
        Self {
            drive: DrivetrainController::from_config(bus, &config.drive),
            pivot: Pivot::from_config(bus, &config.pivot),
            shield: Shield::from_config(bus, &config.shield),
            shooter: ShooterFeeder::from_config(bus, &config.shooter),
        }
    }

    pub fn stop_all(&mut self) {
        self.drive.stop();
        self.pivot.stop();
        self.shield.stop();
        self.shooter.stop_all();
    }

    pub fn pivot_to(&self, which: PivotPosition) -> Node {
        let name = match which {
            PivotPosition::ShootingHigh => "Pivot to High",
            PivotPosition::ShootingLow => "Pivot to Low",
            PivotPosition::Intake => "Pivot to Intake",
        };
        action(name, self.pivot.port_ids(), move |s: &mut Subsystems| {
            s.pivot.move_to(which)
        })
    }

    pub fn shield_to(&self, which: ShieldPosition) -> Node {
        let name = match which {
            ShieldPosition::Down => "Shield Down",
            ShieldPosition::Mid => "Shield Mid",
            ShieldPosition::Up => "Shield Up",
        };
        action(name, self.shield.port_ids(), move |s: &mut Subsystems| {
            s.shield.move_to(which)
        })
    }

    pub fn spin_up(&self) -> Node {
        action("Spin Up Shooter", self.shooter.shooter_port_ids(), |s: &mut Subsystems| {
            s.shooter.spin_up()
        })
    }

    pub fn spin_reverse(&self) -> Node {
        action("Spin Shooter Reverse", self.shooter.shooter_port_ids(), |s: &mut Subsystems| {
            s.shooter.spin_reverse()
        })
    }

    pub fn feed(&self) -> Node {
        action("Feed", self.shooter.feeder_port_ids(), |s: &mut Subsystems| {
            s.shooter.feed()
        })
    }

    pub fn feed_reverse(&self) -> Node {
        action("Feed Reverse", self.shooter.feeder_port_ids(), |s: &mut Subsystems| {
            s.shooter.feed_reverse()
        })
    }

    pub fn stop_rollers(&self) -> Node {
        action("Stop All", self.shooter.port_ids(), |s: &mut Subsystems| {
            s.shooter.stop_all()
        })
    }

    pub fn reset_drive_encoders(&self) -> Node {
        action("Reset Encoders", self.drive.port_ids(), |s: &mut Subsystems| {
            s.drive.reset_position()
        })
    }

    /// Command both sides, then wait for arrival
    pub fn drive_to_position(&self, left: f64, right: f64) -> Node {
        sequence(vec![
            action("Drive to Position", self.drive.port_ids(), move |s: &mut Subsystems| {
                s.drive.drive_to_position(left, right)
            }),
            wait_until("At Target Position", |s: &Subsystems| {
                s.drive.at_target_position()
            }),
        ])
    }

    /// Hold drive, rollers and pivot still
    pub fn hold_still(&self) -> Node {
        let mut ports = self.drive.port_ids();
        ports.extend(self.shooter.port_ids());
        ports.extend(self.pivot.port_ids());
        action("Do Nothing", ports, |s: &mut Subsystems| {
            s.drive.stop();
            s.shooter.stop_all();
            s.pivot.stop();
        })
    }

    pub fn pivot_past(&self, which: PivotPosition) -> Node {
        wait_until("Pivot Past Setpoint", move |s: &Subsystems| s.pivot.is_past(which))
    }

    pub fn pivot_short_of(&self, which: PivotPosition) -> Node {
        wait_until("Pivot Short of Setpoint", move |s: &Subsystems| {
            s.pivot.is_short_of(which)
        })
    }

    pub fn pivot_at(&self, which: PivotPosition) -> Node {
        wait_until("Pivot at Setpoint", move |s: &Subsystems| s.pivot.is_at(which))
    }

    pub fn shield_at(&self, which: ShieldPosition) -> Node {
        wait_until("Shield at Setpoint", move |s: &Subsystems| s.shield.is_at(which))
    }
}

impl PortStopper for Subsystems {
    fn stop_port(&mut self, id: PortId) {
        let found = self.drive.stop_port(id)
            || self.pivot.stop_port(id)
            || self.shield.stop_port(id)
            || self.shooter.stop_port(id);
        if !found {
            warn!("Stop requested for unknown port {}", id);
        }
    }
}
