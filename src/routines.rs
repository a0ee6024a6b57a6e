// Autonomous routine table
//
// Routines are looked up by key ("Auto 1" .. "Auto 6", "Do Nothing"). A key
// may carry a start position suffix ("Auto 3 Right") which biases the heading
// so field-centric driving matches the robot's angled start against the
// speaker. Unknown names fall back to doing nothing.

use tracing::{info, warn};

use crate::config::AutoTiming;
use crate::mechanism::{PivotPosition, ShieldPosition};
use crate::robot::{Node, Subsystems};
use crate::sequencer::{parallel, sequence, wait_seconds};

pub const DO_NOTHING: &str = "Do Nothing";

/// (key, display title) for every routine, in chooser order
pub const ROUTINES: [(&str, &str); 7] = [
    (DO_NOTHING, "Do Nothing"),
    ("Auto 1", "Auto 1 - Shoot Only"),
    ("Auto 2", "Auto 2 - Center Double"),
    ("Auto 3", "Auto 3 - Right Side Double"),
    ("Auto 4", "Auto 4 - Left Side Double"),
    ("Auto 5", "Auto 5 - Right Side Move"),
    ("Auto 6", "Auto 6 - Left Side Move"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    Left,
    Center,
    Right,
}

impl StartPosition {
    /// Added to the raw gyro reading when zeroing the heading at auto start
    pub fn heading_bias(self, speaker_angle: f64) -> f64 {
        match self {
            StartPosition::Left => -speaker_angle,
            StartPosition::Center => 0.0,
            StartPosition::Right => speaker_angle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutineChoice {
    pub key: &'static str,
    pub title: &'static str,
    pub start: Option<StartPosition>,
}

/// Resolve a selector string to a table entry
pub fn parse(name: &str) -> Option<RoutineChoice> {
    let name = name.trim();
    let (base, start) = match name.rsplit_once(' ') {
        Some((base, "Left")) => (base, Some(StartPosition::Left)),
        Some((base, "Center")) => (base, Some(StartPosition::Center)),
        Some((base, "Right")) => (base, Some(StartPosition::Right)),
        _ => (name, None),
    };
    ROUTINES
        .iter()
        .find(|(key, title)| base.eq_ignore_ascii_case(key) || base.eq_ignore_ascii_case(title))
        .map(|&(key, title)| RoutineChoice { key, title, start })
}

/// Pick a routine and build its tree; unknown names resolve to doing nothing
pub fn select(name: &str, s: &Subsystems, timing: &AutoTiming) -> (RoutineChoice, Node) {
    let choice = parse(name).unwrap_or_else(|| {
        warn!("Unknown autonomous routine '{}', doing nothing", name);
        RoutineChoice {
            key: DO_NOTHING,
            title: DO_NOTHING,
            start: None,
        }
    });
    info!("Autonomous routine: {}", choice.title);
    (choice, build(choice.key, s, timing))
}

/// Build the tree for a table key
pub fn build(key: &str, s: &Subsystems, timing: &AutoTiming) -> Node {
    match key {
        "Auto 1" => shoot_only(s, timing),
        "Auto 2" => center_double(s, timing),
        "Auto 3" => side_double(s, timing, [(-15.0, -15.0), (-45.0, -15.0), (-65.0, -35.0)]),
        "Auto 4" => side_double(s, timing, [(-15.0, -15.0), (-15.0, -45.0), (-35.0, -65.0)]),
        "Auto 5" => side_move(s, timing, [(-47.0, -15.0), (-62.0, -30.0)]),
        "Auto 6" => side_move(s, timing, [(-15.0, -47.0), (-30.0, -62.0)]),
        _ => s.hold_still(),
    }
}

// Reset encoders, aim high, spin up, feed
fn opening_shot(s: &Subsystems, timing: &AutoTiming) -> Vec<Node> {
    vec![
        s.reset_drive_encoders(),
        parallel(vec![
            s.pivot_to(PivotPosition::ShootingHigh),
            s.spin_up(),
            s.shield_to(ShieldPosition::Mid),
        ]),
        wait_seconds(timing.shooter_spinup_time),
        s.feed(),
        wait_seconds(timing.feed_time),
    ]
}

// Shot from an already-aimed pivot, ending with the rollers stopped
fn closing_shot(s: &Subsystems, timing: &AutoTiming) -> Vec<Node> {
    vec![
        s.spin_up(),
        wait_seconds(timing.shooter_spinup_time),
        s.feed(),
        wait_seconds(timing.feed_time),
        s.stop_rollers(),
    ]
}

// Stop rollers, drop pivot and shield for intake, wait for the pivot to land
fn lower_to_intake(s: &Subsystems) -> Vec<Node> {
    vec![
        s.stop_rollers(),
        parallel(vec![
            s.pivot_to(PivotPosition::Intake),
            s.shield_to(ShieldPosition::Down),
        ]),
        s.pivot_at(PivotPosition::Intake),
    ]
}

fn intake_while_driving(s: &Subsystems, left: f64, right: f64) -> Node {
    parallel(vec![
        s.spin_reverse(),
        s.feed_reverse(),
        s.drive_to_position(left, right),
    ])
}

fn shoot_only(s: &Subsystems, timing: &AutoTiming) -> Node {
    let mut steps = opening_shot(s, timing);
    steps.push(s.stop_rollers());
    sequence(steps)
}

fn center_double(s: &Subsystems, timing: &AutoTiming) -> Node {
    let mut steps = opening_shot(s, timing);
    steps.extend(lower_to_intake(s));
    steps.extend([
        intake_while_driving(s, -25.0, -25.0),
        s.stop_rollers(),
        s.pivot_to(PivotPosition::ShootingHigh),
        s.pivot_short_of(PivotPosition::ShootingLow),
        s.shield_to(ShieldPosition::Mid),
        s.drive_to_position(0.0, 0.0),
    ]);
    steps.extend(closing_shot(s, timing));
    sequence(steps)
}

// `legs`: back off the line, turn toward the note, drive onto it. The return
// trip retraces the turn leg, then the first leg, then the start line.
fn side_double(s: &Subsystems, timing: &AutoTiming, legs: [(f64, f64); 3]) -> Node {
    let [back, turn, pickup] = legs;
    let mut steps = opening_shot(s, timing);
    steps.extend(lower_to_intake(s));
    steps.extend([
        intake_while_driving(s, back.0, back.1),
        s.drive_to_position(turn.0, turn.1),
        s.drive_to_position(pickup.0, pickup.1),
        s.drive_to_position(turn.0, turn.1),
        parallel(vec![
            s.stop_rollers(),
            s.pivot_to(PivotPosition::ShootingHigh),
            sequence(vec![
                s.pivot_short_of(PivotPosition::ShootingLow),
                s.shield_to(ShieldPosition::Mid),
            ]),
        ]),
        s.drive_to_position(back.0, back.1),
        s.drive_to_position(0.0, 0.0),
    ]);
    steps.extend(closing_shot(s, timing));
    sequence(steps)
}

fn side_move(s: &Subsystems, timing: &AutoTiming, legs: [(f64, f64); 2]) -> Node {
    let mut steps = opening_shot(s, timing);
    steps.push(s.stop_rollers());
    steps.push(wait_seconds(timing.wait_time));
    steps.extend(legs.map(|(left, right)| s.drive_to_position(left, right)));
    sequence(steps)
}
