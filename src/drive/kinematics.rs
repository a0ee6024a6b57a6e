// Mecanum inverse kinematics
// Converts (forward, strafe, rotate) intent into four normalized wheel outputs.

/// Per-wheel outputs for one control tick
///
/// Normalized fractions in [-1, 1] straight out of `mecanum`; the drivetrain
/// scales them to wheel velocities when running closed loop.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelCommand {
    pub front_left: f64,
    pub front_right: f64,
    pub rear_left: f64,
    pub rear_right: f64,
}

impl WheelCommand {
    pub fn new(front_left: f64, front_right: f64, rear_left: f64, rear_right: f64) -> Self {
        Self {
            front_left,
            front_right,
            rear_left,
            rear_right,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Returns outputs as array [front_left, front_right, rear_left, rear_right]
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.front_left,
            self.front_right,
            self.rear_left,
            self.rear_right,
        ]
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(
            self.front_left * factor,
            self.front_right * factor,
            self.rear_left * factor,
            self.rear_right * factor,
        )
    }

    /// Largest absolute wheel output
    pub fn peak(&self) -> f64 {
        self.as_array().iter().fold(0.0f64, |max, v| max.max(v.abs()))
    }
}

/// Rotate drive intent by -heading so "forward" is a fixed field direction
///
/// # Arguments
/// * `forward` - Robot-relative forward intent
/// * `strafe` - Robot-relative strafe intent
/// * `heading_deg` - Current heading in degrees
///
/// # Returns
/// (forward, strafe) after rotation
pub fn field_relative(forward: f64, strafe: f64, heading_deg: f64) -> (f64, f64) {
    let (sin, cos) = heading_deg.to_radians().sin_cos();
    let rotated_strafe = strafe * cos - forward * sin;
    let rotated_forward = strafe * sin + forward * cos;
    (rotated_forward, rotated_strafe)
}

/// Mix drive intent into four wheel outputs
///
/// If any raw wheel sum exceeds 1 in magnitude, all four are divided by the
/// largest magnitude so the ratios between wheels are preserved.
pub fn mecanum(forward: f64, strafe: f64, rotate: f64) -> WheelCommand {
    let raw = WheelCommand {
        front_left: forward + strafe + rotate,
        front_right: forward - strafe - rotate,
        rear_left: forward - strafe + rotate,
        rear_right: forward + strafe - rotate,
    };

    let scale = raw.peak().max(1.0);
    raw.scaled(1.0 / scale)
}
