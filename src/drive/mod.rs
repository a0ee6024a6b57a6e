// Mecanum drivetrain controller
//
// Combines kinematics with the four wheel ports to provide:
// - Teleop driving in open-loop or closed-loop velocity mode
// - Optional field-centric rotation of drive intent
// - Absolute position targets for autonomous drive legs

pub mod kinematics;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::actuator::{build_port, ActuatorPort, PortId, Reading, SharedBus};
use crate::config::DriveConfig;

pub use kinematics::{field_relative, mecanum, WheelCommand};

/// How wheel outputs are dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveMode {
    /// Normalized fractions straight to the motors
    OpenLoopVoltage,
    /// Fractions scaled by the max wheel velocity, tracked closed loop
    ClosedLoopVelocity,
}

/// The four wheel ports, owned exclusively by the drivetrain
pub struct DrivePorts {
    pub front_left: Box<dyn ActuatorPort>,
    pub front_right: Box<dyn ActuatorPort>,
    pub rear_left: Box<dyn ActuatorPort>,
    pub rear_right: Box<dyn ActuatorPort>,
}

impl DrivePorts {
    fn iter(&self) -> impl Iterator<Item = &Box<dyn ActuatorPort>> {
        [
            &self.front_left,
            &self.front_right,
            &self.rear_left,
            &self.rear_right,
        ]
        .into_iter()
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn ActuatorPort>> {
        [
            &mut self.front_left,
            &mut self.front_right,
            &mut self.rear_left,
            &mut self.rear_right,
        ]
        .into_iter()
    }
}

pub struct DrivetrainController {
    ports: DrivePorts,
    mode: DriveMode,
    field_centric: bool,
    has_position_sensing: bool,
    max_wheel_velocity: f64,
    position_tolerance: f64,
    left_target: f64,
    right_target: f64,
    warned_no_heading: bool,
}

impl DrivetrainController {
    /// Build the drivetrain for the configured hardware profile
    pub fn from_config(bus: &SharedBus, config: &DriveConfig) -> Self {
        let [fl, fr, rl, rr] = config.port_configs();
        let ports = DrivePorts {
            front_left: build_port(bus, &fl),
            front_right: build_port(bus, &fr),
            rear_left: build_port(bus, &rl),
            rear_right: build_port(bus, &rr),
        };
        info!(
            "Drivetrain: {:?}, encoders={}",
            config.hardware, config.has_drive_encoders
        );
        Self::new(ports, config.max_wheel_velocity, config.position_tolerance)
    }

    pub fn new(ports: DrivePorts, max_wheel_velocity: f64, position_tolerance: f64) -> Self {
        let has_position_sensing = ports
            .iter()
            .all(|port| port.capabilities().has_position_sensor);
        if !has_position_sensing {
            warn!("Drivetrain has no position sensing, autonomous drive legs will be skipped");
        }

        Self {
            ports,
            mode: DriveMode::OpenLoopVoltage,
            field_centric: false,
            has_position_sensing,
            max_wheel_velocity,
            position_tolerance,
            left_target: 0.0,
            right_target: 0.0,
            warned_no_heading: false,
        }
    }

    /// Drive with already-deadbanded intent
    ///
    /// # Arguments
    /// * `forward` - Forward intent in [-1, 1] (positive = forward)
    /// * `strafe` - Strafe intent in [-1, 1]
    /// * `rotate` - Rotation intent in [-1, 1]
    /// * `heading_deg` - Current heading, used only in field-centric mode
    ///
    /// # Returns
    /// The normalized wheel outputs that were dispatched
    pub fn drive(
        &mut self,
        forward: f64,
        strafe: f64,
        rotate: f64,
        heading_deg: Option<f64>,
    ) -> WheelCommand {
        let (forward, strafe) = match (self.field_centric, heading_deg) {
            (true, Some(heading)) => field_relative(forward, strafe, heading),
            (true, None) => {
                if !self.warned_no_heading {
                    warn!("Field-centric drive without a heading, driving robot-relative");
                    self.warned_no_heading = true;
                }
                (forward, strafe)
            }
            (false, _) => (forward, strafe),
        };

        let wheels = mecanum(forward, strafe, rotate);
        self.dispatch(wheels);
        wheels
    }

    fn dispatch(&mut self, wheels: WheelCommand) {
        let ports = &mut self.ports;
        match self.mode {
            DriveMode::OpenLoopVoltage => {
                ports.front_left.set_open_loop(wheels.front_left);
                ports.front_right.set_open_loop(wheels.front_right);
                ports.rear_left.set_open_loop(wheels.rear_left);
                ports.rear_right.set_open_loop(wheels.rear_right);
            }
            DriveMode::ClosedLoopVelocity => {
                let velocities = wheels.scaled(self.max_wheel_velocity);
                ports.front_left.set_closed_loop_velocity(velocities.front_left);
                ports.front_right.set_closed_loop_velocity(velocities.front_right);
                ports.rear_left.set_closed_loop_velocity(velocities.rear_left);
                ports.rear_right.set_closed_loop_velocity(velocities.rear_right);
            }
        }
    }

    /// Command absolute side positions (rotations)
    ///
    /// Both left wheels get `left`, both right wheels get `right`. A no-op
    /// when the hardware has no position sensing.
    pub fn drive_to_position(&mut self, left: f64, right: f64) {
        if !self.has_position_sensing {
            return;
        }
        self.left_target = left;
        self.right_target = right;

        let ports = &mut self.ports;
        ports.front_left.set_position_target(left);
        ports.rear_left.set_position_target(left);
        ports.front_right.set_position_target(right);
        ports.rear_right.set_position_target(right);
    }

    /// True when both front wheels are within tolerance of their targets
    ///
    /// Always true without position sensing, and true for a reading that is
    /// unavailable, so a drive leg can never hang a routine.
    pub fn at_target_position(&self) -> bool {
        if !self.has_position_sensing {
            return true;
        }
        let within = |reading: Reading, target: f64| {
            !reading.available || (reading.value - target).abs() < self.position_tolerance
        };
        within(self.ports.front_left.position(), self.left_target)
            && within(self.ports.front_right.position(), self.right_target)
    }

    /// Zero the wheel encoders and both side targets
    pub fn reset_position(&mut self) {
        for port in self.ports.iter_mut() {
            port.reset_position();
        }
        self.left_target = 0.0;
        self.right_target = 0.0;
    }

    pub fn stop(&mut self) {
        for port in self.ports.iter_mut() {
            port.stop();
        }
    }

    /// Stop a single wheel; false if the port is not a drive wheel
    pub fn stop_port(&mut self, id: PortId) -> bool {
        match self.ports.iter_mut().find(|port| port.id() == id) {
            Some(port) => {
                port.stop();
                true
            }
            None => false,
        }
    }

    /// Wheel port ids [front_left, front_right, rear_left, rear_right]
    pub fn port_ids(&self) -> Vec<PortId> {
        self.ports.iter().map(|port| port.id()).collect()
    }

    pub fn toggle_drive_mode(&mut self) {
        self.mode = match self.mode {
            DriveMode::OpenLoopVoltage => DriveMode::ClosedLoopVelocity,
            DriveMode::ClosedLoopVelocity => DriveMode::OpenLoopVoltage,
        };
        info!("Drive mode: {:?}", self.mode);
    }

    pub fn drive_mode(&self) -> DriveMode {
        self.mode
    }

    pub fn toggle_field_centric(&mut self) {
        self.set_field_centric(!self.field_centric);
    }

    pub fn set_field_centric(&mut self, enabled: bool) {
        if self.field_centric != enabled {
            info!("Field-centric: {}", enabled);
        }
        self.field_centric = enabled;
    }

    pub fn field_centric(&self) -> bool {
        self.field_centric
    }

    pub fn has_position_sensing(&self) -> bool {
        self.has_position_sensing
    }

    /// Wheel positions [front_left, front_right, rear_left, rear_right]
    pub fn wheel_positions(&self) -> [Reading; 4] {
        let mut out = [Reading::UNAVAILABLE; 4];
        for (slot, port) in out.iter_mut().zip(self.ports.iter()) {
            *slot = port.position();
        }
        out
    }
}
