// Robot modes and the per-tick entry point
//
// Owns the subsystems plus two routine schedulers: one for autonomous
// routines and one (inside the teleop bindings) for held-button groups.
// Entering a mode cancels whatever the previous mode left running, so the
// two never drive ports at the same time.

pub mod subsystems;

use std::time::Duration;

use tracing::{info, warn};

use crate::actuator::SharedBus;
use crate::config::{AutoConfig, RobotConfig};
use crate::drive::WheelCommand;
use crate::messages::{ModeCommand, OperatorInput, RobotMode, TelemetryFrame};
use crate::routines;
use crate::sequencer::Sequencer;
use crate::teleop::{DriveIntent, TeleopBindings};

pub use subsystems::{Node, Subsystems};

pub struct Robot {
    subsystems: Subsystems,
    autonomous: Sequencer<Subsystems>,
    teleop: TeleopBindings,
    auto_config: AutoConfig,
    mode: RobotMode,
    selected_auto: String,
    raw_heading: Option<f64>,
    heading_offset: f64,
    last_input: OperatorInput,
    intent: DriveIntent,
    wheels: WheelCommand,
}

impl Robot {
    pub fn from_config(bus: &SharedBus, config: &RobotConfig) -> Self {
        Self::new(Subsystems::from_config(bus, config), config)
    }

    pub fn new(subsystems: Subsystems, config: &RobotConfig) -> Self {
        Self {
            subsystems,
            autonomous: Sequencer::new("Autonomous"),
            teleop: TeleopBindings::new(config.operator.clone()),
            auto_config: config.auto.clone(),
            mode: RobotMode::Disabled,
            selected_auto: config.auto.default_routine.clone(),
            raw_heading: None,
            heading_offset: 0.0,
            last_input: OperatorInput::default(),
            intent: DriveIntent::default(),
            wheels: WheelCommand::zero(),
        }
    }

    pub fn mode(&self) -> RobotMode {
        self.mode
    }

    pub fn subsystems(&self) -> &Subsystems {
        &self.subsystems
    }

    pub fn subsystems_mut(&mut self) -> &mut Subsystems {
        &mut self.subsystems
    }

    /// Latest raw gyro yaw (None without a gyro)
    pub fn set_heading(&mut self, raw_deg: Option<f64>) {
        self.raw_heading = raw_deg;
    }

    /// Offset-corrected heading
    pub fn heading(&self) -> Option<f64> {
        self.raw_heading.map(|raw| raw - self.heading_offset)
    }

    /// Make the current direction read as `bias` degrees below zero
    fn zero_heading(&mut self, bias: f64) {
        self.heading_offset = self.raw_heading.unwrap_or(0.0) + bias;
        info!("Heading zeroed (offset {:.2})", self.heading_offset);
    }

    /// Routine used by the next `autonomous_init(None)`
    pub fn select_auto(&mut self, name: &str) {
        if self.selected_auto != name {
            info!("Autonomous selection: {}", name);
            self.selected_auto = name.to_string();
        }
    }

    pub fn selected_auto(&self) -> &str {
        &self.selected_auto
    }

    pub fn is_autonomous_running(&self) -> bool {
        self.autonomous.is_active()
    }

    pub fn is_teleop_group_running(&self) -> bool {
        self.teleop.is_active()
    }

    /// Apply a mode command from the driver station
    pub fn apply_mode(&mut self, command: &ModeCommand) {
        match command.mode {
            RobotMode::Disabled => self.disabled_init(),
            RobotMode::Autonomous => self.autonomous_init(command.routine.as_deref()),
            RobotMode::Teleop => self.teleop_init(),
        }
    }

    pub fn disabled_init(&mut self) {
        info!("Mode: disabled");
        self.autonomous.cancel(&mut self.subsystems);
        self.teleop.cancel(&mut self.subsystems);
        self.subsystems.stop_all();
        self.mode = RobotMode::Disabled;
    }

    /// Start the named routine, or the selected one when `name` is None
    pub fn autonomous_init(&mut self, name: Option<&str>) {
        info!("Mode: autonomous");
        self.teleop.cancel(&mut self.subsystems);
        if let Some(name) = name {
            self.select_auto(name);
        }

        let (choice, root) = routines::select(
            &self.selected_auto,
            &self.subsystems,
            &self.auto_config.timing,
        );
        if let Some(start) = choice.start {
            self.zero_heading(start.heading_bias(self.auto_config.speaker_angle));
        }
        self.autonomous.start(choice.title, root, &mut self.subsystems);
        self.intent = DriveIntent::default();
        self.wheels = WheelCommand::zero();
        self.mode = RobotMode::Autonomous;
    }

    pub fn teleop_init(&mut self) {
        info!("Mode: teleop");
        self.autonomous.cancel(&mut self.subsystems);
        self.teleop.reset(&mut self.subsystems, &self.last_input);
        self.mode = RobotMode::Teleop;
    }

    /// Run one control tick
    ///
    /// # Arguments
    /// * `input` - Operator input for this tick (neutral if stale)
    /// * `now` - Monotonic tick time
    pub fn tick(&mut self, input: &OperatorInput, now: Duration) -> TelemetryFrame {
        match self.mode {
            RobotMode::Disabled => {}
            RobotMode::Autonomous => {
                debug_assert!(
                    !self.teleop.is_active(),
                    "teleop group running during autonomous"
                );
                if self.teleop.is_active() {
                    warn!("Teleop group still running in autonomous, cancelling");
                    self.teleop.cancel(&mut self.subsystems);
                }
                self.autonomous.poll(&mut self.subsystems, now);
            }
            RobotMode::Teleop => {
                debug_assert!(
                    !self.autonomous.is_active(),
                    "autonomous routine running during teleop"
                );
                if self.autonomous.is_active() {
                    warn!("Autonomous routine still running in teleop, cancelling");
                    self.autonomous.cancel(&mut self.subsystems);
                }
                let heading = self.heading();
                let status = self
                    .teleop
                    .update(input, &mut self.subsystems, heading, now);
                if status.zero_heading {
                    self.zero_heading(0.0);
                }
                self.intent = status.intent;
                self.wheels = status.wheels;
            }
        }
        self.last_input = *input;
        self.telemetry()
    }

    pub fn telemetry(&self) -> TelemetryFrame {
        let s = &self.subsystems;
        let (routine, routine_step) = match self.mode {
            RobotMode::Autonomous => (
                self.autonomous.active_name().map(str::to_string),
                self.autonomous.current_step(),
            ),
            RobotMode::Teleop => (
                self.teleop.active_group().map(|group| group.name().to_string()),
                self.teleop.current_step(),
            ),
            RobotMode::Disabled => (None, None),
        };

        TelemetryFrame {
            mode: self.mode,
            forward: self.intent.forward,
            strafe: self.intent.strafe,
            rotate: self.intent.rotate,
            heading_deg: self.heading(),
            field_centric: s.drive.field_centric(),
            drive_mode: s.drive.drive_mode(),
            wheel_outputs: self.wheels.as_array(),
            wheel_positions: s
                .drive
                .wheel_positions()
                .map(|reading| reading.available.then_some(reading.value)),
            pivot_position: s.pivot.position(),
            shield_position: s.shield.position(),
            shooter_output: s.shooter.shooter_output(),
            feeder_output: s.shooter.feeder_output(),
            selected_auto: self.selected_auto.clone(),
            routine,
            routine_step: routine_step.map(str::to_string),
        }
    }
}
