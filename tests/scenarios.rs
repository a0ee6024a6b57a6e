// Whole-robot scenarios against the simulated motor bus

use std::cell::RefCell;
use std::rc::Rc;

use mecanum_motion_core::actuator::{Demand, SharedBus, SimBus};
use mecanum_motion_core::config::{tick_period, RobotConfig};
use mecanum_motion_core::drive::DriveMode;
use mecanum_motion_core::messages::{OperatorInput, TelemetryFrame};
use mecanum_motion_core::robot::Robot;

struct Harness {
    sim: Rc<RefCell<SimBus>>,
    robot: Robot,
    ticks: u32,
}

impl Harness {
    fn new(config: &RobotConfig) -> Self {
        let sim = Rc::new(RefCell::new(SimBus::new()));
        let bus: SharedBus = sim.clone();
        let robot = Robot::from_config(&bus, config);
        Self {
            sim,
            robot,
            ticks: 0,
        }
    }

    /// One robot tick followed by one simulation step
    fn tick(&mut self, input: &OperatorInput) -> TelemetryFrame {
        let telemetry = self.robot.tick(input, tick_period() * self.ticks);
        self.sim.borrow_mut().step(tick_period().as_secs_f64());
        self.ticks += 1;
        telemetry
    }

    /// Tick until the autonomous routine ends; false if still running after `limit`
    fn finish_autonomous(&mut self, limit: u32) -> bool {
        let input = OperatorInput::default();
        for _ in 0..limit {
            self.tick(&input);
            if !self.robot.is_autonomous_running() {
                return true;
            }
        }
        false
    }

    fn demand(&self, id: u8) -> Option<Demand> {
        self.sim.borrow().demand(id)
    }
}

#[test]
fn test_center_double_returns_to_start() {
    let mut h = Harness::new(&RobotConfig::default());
    h.robot.autonomous_init(Some("Auto 2"));
    assert!(h.finish_autonomous(1500), "Center double should finish");

    let positions = h.robot.subsystems().drive.wheel_positions();
    assert!(positions[0].available);
    assert!(
        positions[0].value.abs() < 0.5,
        "Front left should be back at the line, got {}",
        positions[0].value
    );
    assert!(h.robot.subsystems().shooter.is_stopped());
}

#[test]
fn test_side_double_without_drive_encoders_never_hangs() {
    let config = RobotConfig::from_json(
        r#"{ "drive": { "drivetrainType": "TALON_SRX_CIM", "hasDriveEncoders": false } }"#,
    )
    .unwrap();
    let mut h = Harness::new(&config);
    assert!(!h.robot.subsystems().drive.has_position_sensing());
    assert_eq!(h.sim.borrow().settings(1).map(|s| s.has_sensor), Some(false));

    h.robot.autonomous_init(Some("Auto 3 Right"));
    assert!(h.finish_autonomous(1500), "Drive legs are skipped, routine must finish");

    for id in 1..=4 {
        let demand = h.demand(id);
        assert!(
            !matches!(demand, Some(Demand::Position(_)) | Some(Demand::MotionProfile(_))),
            "Wheel {} got a position demand: {:?}",
            id,
            demand
        );
    }
}

#[test]
fn test_side_move_waits_before_driving() {
    let mut h = Harness::new(&RobotConfig::default());
    h.robot.autonomous_init(Some("Auto 5"));

    // Opening shot is done after ~1.6 s, then the 10 s wait holds the drive
    let input = OperatorInput::default();
    for _ in 0..300 {
        h.tick(&input);
    }
    assert!(h.robot.is_autonomous_running());
    assert!(
        !matches!(h.demand(1), Some(Demand::MotionProfile(_))),
        "No drive leg before the wait ends"
    );

    assert!(h.finish_autonomous(1000));
    let positions = h.robot.subsystems().drive.wheel_positions();
    assert!((positions[0].value + 62.0).abs() < 0.5, "Left side ends at -62");
    assert!((positions[1].value + 30.0).abs() < 0.5, "Right side ends at -30");
}

#[test]
fn test_failed_shooter_does_not_stall_autonomous() {
    let mut h = Harness::new(&RobotConfig::default());
    h.sim.borrow_mut().fail_device(8, true);

    h.robot.autonomous_init(Some("Auto 1"));
    assert!(h.finish_autonomous(200));
    assert_eq!(h.sim.borrow().stop_count(8), 0, "Failed device saw no demands");
    assert_eq!(h.demand(7), Some(Demand::Neutral));
}

#[test]
fn test_closed_loop_toggle_scales_by_max_wheel_velocity() {
    let mut h = Harness::new(&RobotConfig::default());
    h.robot.teleop_init();

    let mut input = OperatorInput::default();
    input.driver.start = true;
    h.tick(&input);

    input.driver.start = false;
    input.driver.left_y = -1.0;
    let telemetry = h.robot.tick(&input, tick_period() * h.ticks);
    assert_eq!(telemetry.drive_mode, DriveMode::ClosedLoopVelocity);
    assert_eq!(h.demand(1), Some(Demand::Velocity(5000.0)));
    assert_eq!(h.demand(4), Some(Demand::Velocity(5000.0)));
}

#[test]
fn test_pivot_rezero_beats_held_trigger() {
    let mut h = Harness::new(&RobotConfig::default());
    h.robot.teleop_init();

    let mut input = OperatorInput::default();
    input.operator.a = true;
    for _ in 0..10 {
        h.tick(&input);
    }
    assert!(h.robot.subsystems().pivot.position() > 0.0);

    input.operator.left_bumper = true;
    let telemetry = h.robot.tick(&input, tick_period() * h.ticks);
    assert!(!h.robot.is_teleop_group_running(), "Re-zero cancels the group");
    assert_eq!(telemetry.pivot_position, 0.0);
    assert_eq!(h.demand(5), Some(Demand::Neutral));
    assert!(h.robot.subsystems().shooter.is_stopped());
}
