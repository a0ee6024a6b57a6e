// Loop timing, topics, and the robot configuration record
//
// Process constants stay compile-time. Everything robot-specific (bus ids,
// inversions, gains, setpoints) comes from a JSON file loaded once at
// startup; any field missing from the file falls back to the default below.
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::actuator::{
    Gains, MotorFamily, PortConfig, PortId, ProfileLimits, TALON_TICKS_PER_REV,
};

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Operator input older than this is treated as released sticks/buttons
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_OPERATOR: &str = "robot/cmd/operator"; // operator input
pub const TOPIC_CMD_MODE: &str = "robot/cmd/mode"; // mode changes
pub const TOPIC_STATE_MOTORS: &str = "robot/state/motors"; // hardware feedback
pub const TOPIC_RT_MOTORS: &str = "robot/rt/motors"; // motor command frames
pub const TOPIC_TELEMETRY: &str = "robot/state/telemetry"; // telemetry
pub const TOPIC_HEALTH: &str = "robot/state/health"; // health status

// Default config file name, looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "robot-config.json";

/// Control tick period derived from the loop rate
pub fn tick_period() -> Duration {
    Duration::from_millis(1000 / LOOP_HZ)
}

/// Error types for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Complete robot configuration, immutable once loaded
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RobotConfig {
    pub operator: OperatorConfig,
    pub drive: DriveConfig,
    pub pivot: PivotConfig,
    pub shield: ShieldConfig,
    pub shooter: ShooterConfig,
    pub auto: AutoConfig,
}

impl RobotConfig {
    /// Read and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: RobotConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("drive.positionTolerance", self.drive.position_tolerance)?;
        positive("drive.maxWheelVelocity", self.drive.max_wheel_velocity)?;
        positive("pivot.positionTolerance", self.pivot.position_tolerance)?;
        positive("shield.positionTolerance", self.shield.position_tolerance)?;

        for (field, value) in [
            ("operator.deadband", self.operator.deadband),
            ("operator.deadbandY", self.operator.deadband_y),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{} is outside [0, 1)", value),
                });
            }
        }

        let timing = &self.auto.timing;
        for (field, value) in [
            ("auto.timing.shooterSpinupTime", timing.shooter_spinup_time),
            ("auto.timing.feedTime", timing.feed_time),
            ("auto.timing.waitTime", timing.wait_time),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{} is not a non-negative duration", value),
                });
            }
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{} must be greater than 0", value),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OperatorConfig {
    pub driver_controller_port: u8,
    pub operator_controller_port: u8,
    pub deadband: f64,
    /// Forward axis uses a wider deadband
    pub deadband_y: f64,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            driver_controller_port: 0,
            operator_controller_port: 1,
            deadband: 0.12,
            deadband_y: 0.24,
        }
    }
}

/// Drivetrain hardware profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DrivetrainHardware {
    /// Competition robot: brushless motors, integrated encoders
    SparkMaxNeo,
    /// Practice robot: brushed motors, encoders optional
    TalonSrxCim,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorIdAndInvert {
    pub id: PortId,
    pub inverted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PidConfig {
    pub slot: u8,
    pub p: f64,
    pub i: f64,
    pub d: f64,
    pub f: f64,
    pub i_zone: f64,
    pub max_output: f64,
    pub min_output: f64,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            slot: 0,
            p: 0.0,
            i: 0.0,
            d: 0.0,
            f: 0.0,
            i_zone: 0.0,
            max_output: 1.0,
            min_output: -1.0,
        }
    }
}

impl PidConfig {
    fn gains(&self) -> Gains {
        Gains {
            p: self.p,
            i: self.i,
            d: self.d,
            f: self.f,
            i_zone: self.i_zone,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SmartMotionConfig {
    pub max_velocity: f64,
    pub max_acceleration: f64,
    pub min_velocity: f64,
    pub allowed_error: f64,
}

impl Default for SmartMotionConfig {
    fn default() -> Self {
        Self {
            max_velocity: 5000.0,
            max_acceleration: 8000.0,
            min_velocity: 0.0,
            allowed_error: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MotionMagicConfig {
    pub cruise_velocity: f64,
    pub acceleration: f64,
    pub s_curve_strength: u8,
}

impl Default for MotionMagicConfig {
    fn default() -> Self {
        Self {
            cruise_velocity: 100_000.0,
            acceleration: 60_000.0,
            s_curve_strength: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DriveConfig {
    #[serde(rename = "drivetrainType")]
    pub hardware: DrivetrainHardware,
    pub has_drive_encoders: bool,
    pub front_left: MotorIdAndInvert,
    pub rear_left: MotorIdAndInvert,
    pub front_right: MotorIdAndInvert,
    pub rear_right: MotorIdAndInvert,
    pub ramp_rate: f64,
    /// Wheel velocity at full stick in closed-loop mode (RPM)
    pub max_wheel_velocity: f64,
    pub pid: PidConfig,
    pub smart_motion: SmartMotionConfig,
    /// Autonomous arrival tolerance (wheel rotations)
    pub position_tolerance: f64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            hardware: DrivetrainHardware::SparkMaxNeo,
            has_drive_encoders: true,
            front_left: MotorIdAndInvert { id: 1, inverted: true },
            rear_left: MotorIdAndInvert { id: 2, inverted: true },
            front_right: MotorIdAndInvert { id: 3, inverted: false },
            rear_right: MotorIdAndInvert { id: 4, inverted: false },
            ramp_rate: 0.2,
            max_wheel_velocity: 5000.0,
            pid: PidConfig {
                p: 0.0001,
                i: 0.000001,
                f: 0.000156,
                ..PidConfig::default()
            },
            smart_motion: SmartMotionConfig::default(),
            position_tolerance: 0.5,
        }
    }
}

impl DriveConfig {
    /// Port configs [front_left, front_right, rear_left, rear_right]
    pub fn port_configs(&self) -> [PortConfig; 4] {
        let (family, has_sensor, profile) = match self.hardware {
            DrivetrainHardware::SparkMaxNeo => (
                MotorFamily::SparkMax,
                true,
                Some(ProfileLimits {
                    cruise_velocity: self.smart_motion.max_velocity,
                    acceleration: self.smart_motion.max_acceleration,
                    smoothing: 0,
                }),
            ),
            DrivetrainHardware::TalonSrxCim => (
                MotorFamily::TalonSrx {
                    ticks_per_unit: TALON_TICKS_PER_REV,
                },
                self.has_drive_encoders,
                None,
            ),
        };

        [self.front_left, self.front_right, self.rear_left, self.rear_right].map(|motor| {
            PortConfig {
                id: motor.id,
                family,
                has_sensor,
                inverted: motor.inverted,
                sensor_phase: has_sensor,
                ramp_rate: self.ramp_rate,
                peak_output_forward: self.pid.max_output,
                peak_output_reverse: self.pid.min_output,
                gains: self.pid.gains(),
                profile,
                max_velocity: self.max_wheel_velocity,
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PivotSetpoints {
    pub shooting_high: f64,
    pub shooting_low: f64,
    pub intake: f64,
}

impl Default for PivotSetpoints {
    fn default() -> Self {
        Self {
            shooting_high: 8000.0,
            shooting_low: 73_000.0,
            intake: 160_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PivotConfig {
    pub enabled: bool,
    pub motor_id: PortId,
    /// Encoder counts
    pub setpoints: PivotSetpoints,
    pub position_tolerance: f64,
    pub inverted: bool,
    pub sensor_phase: bool,
    pub peak_output_forward: f64,
    pub peak_output_reverse: f64,
    pub pid: PidConfig,
    pub motion_magic: MotionMagicConfig,
}

impl Default for PivotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            motor_id: 5,
            setpoints: PivotSetpoints::default(),
            position_tolerance: 5000.0,
            inverted: false,
            sensor_phase: true,
            peak_output_forward: 1.0,
            peak_output_reverse: -1.0,
            pid: PidConfig {
                p: 2.0,
                i: 0.0008,
                d: 2.0,
                f: 0.02325,
                ..PidConfig::default()
            },
            motion_magic: MotionMagicConfig::default(),
        }
    }
}

impl PivotConfig {
    pub fn port_config(&self) -> PortConfig {
        PortConfig {
            id: self.motor_id,
            family: MotorFamily::TalonSrx { ticks_per_unit: 1.0 },
            has_sensor: true,
            inverted: self.inverted,
            sensor_phase: self.sensor_phase,
            ramp_rate: 0.0,
            peak_output_forward: self.peak_output_forward,
            peak_output_reverse: self.peak_output_reverse,
            gains: self.pid.gains(),
            profile: Some(ProfileLimits {
                cruise_velocity: self.motion_magic.cruise_velocity,
                acceleration: self.motion_magic.acceleration,
                smoothing: self.motion_magic.s_curve_strength,
            }),
            max_velocity: self.motion_magic.cruise_velocity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShieldSetpoints {
    pub down: f64,
    pub mid: f64,
    pub up: f64,
}

impl Default for ShieldSetpoints {
    fn default() -> Self {
        Self {
            down: 0.0,
            mid: 30.0,
            up: 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShieldConfig {
    pub enabled: bool,
    pub motor_id: PortId,
    pub setpoints: ShieldSetpoints,
    pub position_tolerance: f64,
    pub inverted: bool,
    pub sensor_phase: bool,
    pub peak_output_forward: f64,
    pub peak_output_reverse: f64,
    pub pid: PidConfig,
    /// Sensor value seeded at boot (the shield rests at mid)
    pub initial_position: f64,
    /// Stowed pivot only pulls the shield to mid when it reads below this
    pub stow_guard: f64,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            motor_id: 6,
            setpoints: ShieldSetpoints::default(),
            position_tolerance: 1.0,
            inverted: false,
            sensor_phase: false,
            peak_output_forward: 0.6,
            peak_output_reverse: -0.6,
            pid: PidConfig {
                p: 80.0,
                ..PidConfig::default()
            },
            initial_position: 30.0,
            stow_guard: 100.0,
        }
    }
}

impl ShieldConfig {
    pub fn port_config(&self) -> PortConfig {
        PortConfig {
            id: self.motor_id,
            family: MotorFamily::TalonSrx { ticks_per_unit: 1.0 },
            has_sensor: true,
            inverted: self.inverted,
            sensor_phase: self.sensor_phase,
            ramp_rate: 0.0,
            peak_output_forward: self.peak_output_forward,
            peak_output_reverse: self.peak_output_reverse,
            gains: self.pid.gains(),
            profile: None,
            max_velocity: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShooterConfig {
    pub enabled: bool,
    pub shooter_motor_id: PortId,
    pub feeder_motor_id: PortId,
    pub shooter_inverted: bool,
    pub feeder_inverted: bool,
    pub shooter_speed: f64,
    pub shooter_reverse_speed: f64,
    pub feeder_speed: f64,
    pub feeder_reverse_speed: f64,
}

impl Default for ShooterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            shooter_motor_id: 8,
            feeder_motor_id: 7,
            shooter_inverted: true,
            feeder_inverted: false,
            shooter_speed: 1.0,
            shooter_reverse_speed: -0.8,
            feeder_speed: 1.0,
            feeder_reverse_speed: -0.6,
        }
    }
}

impl ShooterConfig {
    /// Port configs (shooter, feeder); both run open loop
    pub fn port_configs(&self) -> (PortConfig, PortConfig) {
        let family = MotorFamily::TalonSrx { ticks_per_unit: 1.0 };
        (
            PortConfig::open_loop(self.shooter_motor_id, family, self.shooter_inverted),
            PortConfig::open_loop(self.feeder_motor_id, family, self.feeder_inverted),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AutoTiming {
    /// Seconds
    pub shooter_spinup_time: f64,
    pub feed_time: f64,
    /// Pause before the side "move" routines leave the start line
    pub wait_time: f64,
}

impl Default for AutoTiming {
    fn default() -> Self {
        Self {
            shooter_spinup_time: 1.0,
            feed_time: 0.5,
            wait_time: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AutoConfig {
    pub timing: AutoTiming,
    /// Routine used when none is selected
    pub default_routine: String,
    /// Heading of the side start positions relative to the centre one (degrees)
    pub speaker_angle: f64,
}

impl Default for AutoConfig {
    fn default() -> Self {
        Self {
            timing: AutoTiming::default(),
            default_routine: "Do Nothing".to_string(),
            speaker_angle: 63.43,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = RobotConfig::from_json("{}").unwrap();
        assert_eq!(config, RobotConfig::default());
        assert_eq!(config.pivot.setpoints.shooting_low, 73_000.0);
        assert!(!config.shield.enabled, "Shield ships disabled");
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let json = r#"{
            "drive": {
                "drivetrainType": "TALON_SRX_CIM",
                "hasDriveEncoders": false,
                "pid": { "p": 0.5 }
            },
            "shield": { "enabled": true }
        }"#;
        let config = RobotConfig::from_json(json).unwrap();
        assert_eq!(config.drive.hardware, DrivetrainHardware::TalonSrxCim);
        assert!(!config.drive.has_drive_encoders);
        assert_eq!(config.drive.pid.p, 0.5);
        // Unset output range falls back to full scale
        assert_eq!(config.drive.pid.max_output, 1.0);
        assert_eq!(config.drive.pid.min_output, -1.0);
        assert_eq!(config.drive.max_wheel_velocity, 5000.0);
        assert!(config.shield.enabled);
        assert_eq!(config.shield.setpoints.mid, 30.0);
    }

    #[test]
    fn test_zero_tolerance_rejected() {
        let json = r#"{ "pivot": { "positionTolerance": 0 } }"#;
        match RobotConfig::from_json(json) {
            Err(ConfigError::Invalid { field, .. }) => {
                assert_eq!(field, "pivot.positionTolerance")
            }
            other => panic!("Expected invalid tolerance, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(
            RobotConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_drive_port_configs_follow_hardware_profile() {
        let mut drive = DriveConfig::default();
        let ports = drive.port_configs();
        assert_eq!(ports.iter().map(|p| p.id).collect::<Vec<_>>(), [1, 3, 2, 4]);
        assert!(ports.iter().all(|p| p.family == MotorFamily::SparkMax && p.has_sensor));
        assert!(ports[0].inverted && !ports[1].inverted);

        drive.hardware = DrivetrainHardware::TalonSrxCim;
        drive.has_drive_encoders = false;
        let ports = drive.port_configs();
        assert!(ports.iter().all(|p| !p.has_sensor && p.profile.is_none()));
    }

    #[test]
    fn test_tick_period_matches_loop_rate() {
        assert_eq!(tick_period(), Duration::from_millis(20));
    }
}
