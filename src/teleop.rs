// Operator input -> drive intent, mode toggles and mechanism action groups
//
// Priority within a tick, highest first:
// 1. Operator left bumper held: pivot stopped and re-zeroed, nothing else
// 2. A held trigger: its action group, started on the press edge and
//    cancelled on release
// 3. Otherwise the stowed default behaviour
// Drive runs every tick regardless of the above.

use std::time::Duration;

use tracing::info;

use crate::config::OperatorConfig;
use crate::drive::WheelCommand;
use crate::mechanism::{PivotPosition, ShieldPosition};
use crate::messages::{ControllerState, OperatorInput};
use crate::robot::{Node, Subsystems};
use crate::sequencer::{parallel, sequence, Sequencer};

/// Mechanism groups bound to held buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerGroup {
    Intake,
    HighShotFire,
    HighShotPrep,
    LowShotFire,
    LowShotPrep,
}

impl TriggerGroup {
    /// Resolve which group the current buttons ask for
    ///
    /// Buttons on either controller count. Checked in priority order, so
    /// A beats B and fire beats prep.
    pub fn from_input(input: &OperatorInput) -> Option<Self> {
        let either =
            |pick: fn(&ControllerState) -> bool| pick(&input.driver) || pick(&input.operator);
        let fire = either(|c| c.right_bumper);

        if either(|c| c.a) {
            Some(TriggerGroup::Intake)
        } else if either(|c| c.b) {
            Some(if fire {
                TriggerGroup::HighShotFire
            } else {
                TriggerGroup::HighShotPrep
            })
        } else if either(|c| c.x) {
            Some(if fire {
                TriggerGroup::LowShotFire
            } else {
                TriggerGroup::LowShotPrep
            })
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TriggerGroup::Intake => "Intake",
            TriggerGroup::HighShotFire => "High Shot Fire",
            TriggerGroup::HighShotPrep => "High Shot Prep",
            TriggerGroup::LowShotFire => "Low Shot Fire",
            TriggerGroup::LowShotPrep => "Low Shot Prep",
        }
    }

    pub fn build(self, s: &Subsystems) -> Node {
        match self {
            // Shield only drops once the pivot is clear of it
            TriggerGroup::Intake => sequence(vec![
                parallel(vec![
                    s.spin_reverse(),
                    s.feed_reverse(),
                    s.pivot_to(PivotPosition::Intake),
                ]),
                s.pivot_past(PivotPosition::ShootingLow),
                s.shield_to(ShieldPosition::Down),
            ]),
            TriggerGroup::HighShotPrep => parallel(vec![
                s.spin_up(),
                s.pivot_to(PivotPosition::ShootingHigh),
                s.shield_to(ShieldPosition::Mid),
            ]),
            TriggerGroup::HighShotFire => parallel(vec![
                s.spin_up(),
                s.feed(),
                s.pivot_to(PivotPosition::ShootingHigh),
                s.shield_to(ShieldPosition::Mid),
            ]),
            TriggerGroup::LowShotPrep => parallel(vec![
                s.pivot_to(PivotPosition::ShootingLow),
                s.shield_to(ShieldPosition::Up),
            ]),
            TriggerGroup::LowShotFire => parallel(vec![
                s.spin_up(),
                s.feed(),
                s.pivot_to(PivotPosition::ShootingLow),
                s.shield_to(ShieldPosition::Up),
            ]),
        }
    }
}

/// Scale a stick value so output starts from 0 at the deadband edge
pub fn apply_deadband(value: f64, deadband: f64) -> f64 {
    if !value.is_finite() || value.abs() < deadband {
        return 0.0;
    }
    let scaled = (value.abs() - deadband) / (1.0 - deadband);
    scaled.min(1.0).copysign(value)
}

/// Deadbanded drive intent for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveIntent {
    pub forward: f64,
    pub strafe: f64,
    pub rotate: f64,
}

impl DriveIntent {
    pub fn from_driver(driver: &ControllerState, config: &OperatorConfig) -> Self {
        Self {
            forward: -apply_deadband(driver.left_y, config.deadband_y),
            strafe: -apply_deadband(driver.left_x, config.deadband),
            rotate: -apply_deadband(driver.right_x, config.deadband),
        }
    }
}

/// What a teleop tick did, for the robot and telemetry
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TeleopStatus {
    pub intent: DriveIntent,
    pub wheels: WheelCommand,
    pub group: Option<TriggerGroup>,
    /// Operator asked for the current heading to become zero
    pub zero_heading: bool,
}

pub struct TeleopBindings {
    config: OperatorConfig,
    groups: Sequencer<Subsystems>,
    held: Option<TriggerGroup>,
    // Group whose button was already down at reset, ignored until it changes
    ignored: Option<TriggerGroup>,
    previous: OperatorInput,
}

impl TeleopBindings {
    pub fn new(config: OperatorConfig) -> Self {
        Self {
            config,
            groups: Sequencer::new("Teleop"),
            held: None,
            ignored: None,
            previous: OperatorInput::default(),
        }
    }

    /// Forget button history and drop any running group
    ///
    /// Buttons already held when teleop starts do not count as presses.
    pub fn reset(&mut self, s: &mut Subsystems, input: &OperatorInput) {
        self.groups.cancel(s);
        self.held = None;
        self.ignored = TriggerGroup::from_input(input);
        self.previous = *input;
    }

    pub fn cancel(&mut self, s: &mut Subsystems) -> bool {
        self.held = None;
        self.groups.cancel(s)
    }

    pub fn is_active(&self) -> bool {
        self.groups.is_active()
    }

    pub fn active_group(&self) -> Option<TriggerGroup> {
        self.held
    }

    pub fn current_step(&self) -> Option<&'static str> {
        self.groups.current_step()
    }

    /// Run one teleop tick
    ///
    /// # Arguments
    /// * `input` - Current operator input
    /// * `s` - Subsystems to command
    /// * `heading_deg` - Offset-corrected heading, if a gyro is present
    /// * `now` - Tick time
    pub fn update(
        &mut self,
        input: &OperatorInput,
        s: &mut Subsystems,
        heading_deg: Option<f64>,
        now: Duration,
    ) -> TeleopStatus {
        let prev = self.previous;
        self.previous = *input;

        if pressed(prev.driver.start, input.driver.start) {
            s.drive.toggle_drive_mode();
        }
        if pressed(prev.driver.back, input.driver.back) {
            s.drive.toggle_field_centric();
        }
        let zero_heading = pressed(prev.operator.start, input.operator.start);

        if input.operator.left_bumper {
            if pressed(prev.operator.left_bumper, true) {
                info!("Pivot re-zero requested");
                self.cancel(s);
            }
            s.pivot.rezero();
        } else {
            self.update_groups(input, s, now);
            if self.held.is_none() {
                stowed(s);
            }
        }

        let intent = DriveIntent::from_driver(&input.driver, &self.config);
        let wheels = s
            .drive
            .drive(intent.forward, intent.strafe, intent.rotate, heading_deg);

        TeleopStatus {
            intent,
            wheels,
            group: self.held,
            zero_heading,
        }
    }

    fn update_groups(&mut self, input: &OperatorInput, s: &mut Subsystems, now: Duration) {
        let mut wanted = TriggerGroup::from_input(input);
        if self.ignored.is_some() {
            if wanted == self.ignored {
                wanted = None;
            } else {
                self.ignored = None;
            }
        }
        if wanted != self.held {
            match wanted {
                Some(group) => {
                    let root = group.build(s);
                    self.groups.start(group.name(), root, s);
                }
                None => {
                    self.groups.cancel(s);
                }
            }
            self.held = wanted;
        }
        self.groups.poll(s, now);
    }
}

fn pressed(before: bool, now: bool) -> bool {
    now && !before
}

/// Default behaviour while no trigger is held
///
/// Pivot goes to the high shot, rollers stop. The shield returns to mid once
/// the pivot is back above the low shot, or if it is hovering at the low shot
/// with the shield still within its stow guard.
fn stowed(s: &mut Subsystems) {
    s.pivot.move_to(PivotPosition::ShootingHigh);
    s.shooter.stop_all();

    let clear_of_shield = s.pivot.is_short_of(PivotPosition::ShootingLow);
    let hovering = s.shield.is_within_stow_guard() && s.pivot.is_at(PivotPosition::ShootingLow);
    if clear_of_shield || hovering {
        s.shield.move_to(ShieldPosition::Mid);
    }
}
