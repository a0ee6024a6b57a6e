// Message types exchanged with the outside world

use serde::{Deserialize, Serialize};

use crate::actuator::{MotorCommand, PortId, SensorReset};
use crate::drive::DriveMode;

// Gamepad snapshot, one per controller
// Axes are raw [-1, 1] with +Y pointing toward the operator, as gamepads report
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerState {
    pub left_x: f64,
    pub left_y: f64,
    pub right_x: f64,
    pub right_y: f64,
    pub a: bool,
    pub b: bool,
    pub x: bool,
    pub y: bool,
    pub left_bumper: bool,
    pub right_bumper: bool,
    pub start: bool,
    pub back: bool,
}

// Operator input from driver station -> runtime
// Default is the neutral state: sticks centered, nothing pressed
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorInput {
    pub driver: ControllerState,
    pub operator: ControllerState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotMode {
    #[default]
    Disabled,
    Autonomous,
    Teleop,
}

// Mode change from driver station -> runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeCommand {
    pub mode: RobotMode,
    // Only read when entering autonomous
    #[serde(default)]
    pub routine: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorFeedback {
    pub id: PortId,
    pub position: f64,
    pub velocity: f64,
}

// Hardware bridge -> runtime
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorFeedbackFrame {
    pub motors: Vec<MotorFeedback>,
    // Raw gyro yaw; None when no gyro is attached
    pub heading_deg: Option<f64>,
}

// Runtime -> hardware bridge, once per tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorCommandFrame {
    pub seq: u64,
    pub commands: Vec<MotorCommand>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub resets: Vec<SensorReset>,
}

/// Per-tick snapshot for dashboards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub mode: RobotMode,
    pub forward: f64,
    pub strafe: f64,
    pub rotate: f64,
    pub heading_deg: Option<f64>,
    pub field_centric: bool,
    pub drive_mode: DriveMode,
    /// [front_left, front_right, rear_left, rear_right]
    pub wheel_outputs: [f64; 4],
    pub wheel_positions: [Option<f64>; 4],
    pub pivot_position: f64,
    pub shield_position: f64,
    pub shooter_output: f64,
    pub feeder_output: f64,
    pub selected_auto: String,
    pub routine: Option<String>,
    pub routine_step: Option<String>,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    InputStale,
    FeedbackStale,
}
