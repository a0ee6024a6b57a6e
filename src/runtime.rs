// 50 Hz control loop over zenoh
//
// Each tick drains operator, mode and hardware feedback samples, runs one
// robot tick, then publishes the motor command frame, telemetry and health.
// Operator input that stops arriving is treated as released sticks and
// buttons, so a crashed driver station cannot leave a trigger held.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::actuator::{Feedback, FrameBus, SharedBus, SimBus};
use crate::config::{
    tick_period, RobotConfig, CMD_TIMEOUT, LOOP_HZ, TOPIC_CMD_MODE, TOPIC_CMD_OPERATOR,
    TOPIC_HEALTH, TOPIC_RT_MOTORS, TOPIC_STATE_MOTORS, TOPIC_TELEMETRY,
};
use crate::messages::{
    ModeCommand, MotorCommandFrame, MotorFeedbackFrame, OperatorInput, RobotMode, RuntimeHealth,
    TelemetryFrame,
};
use crate::robot::Robot;

/// Startup choices taken from the command line
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    pub initial_mode: RobotMode,
    pub routine: Option<String>,
    /// Run against the in-process simulated bus instead of a hardware bridge
    pub sim: bool,
}

// Where motor demands go
enum Backend {
    Bridge(Rc<RefCell<FrameBus>>),
    Sim(Rc<RefCell<SimBus>>),
}

/// Everything one tick produces
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    /// None in simulation, where nothing listens for frames
    pub frame: Option<MotorCommandFrame>,
    pub telemetry: TelemetryFrame,
    pub health: RuntimeHealth,
}

pub struct Runtime {
    robot: Robot,
    backend: Backend,
    latest_input: OperatorInput,
    input_received_at: Option<Instant>,
    input_stale: bool,
    feedback_received_at: Option<Instant>,
    health: RuntimeHealth,
    seq: u64,
    started: Instant,
}

impl Runtime {
    pub fn new(config: &RobotConfig, options: &RuntimeOptions, started: Instant) -> Self {
        let (backend, bus) = if options.sim {
            let sim = Rc::new(RefCell::new(SimBus::new()));
            let bus: SharedBus = sim.clone();
            (Backend::Sim(sim), bus)
        } else {
            let bridge = Rc::new(RefCell::new(FrameBus::new()));
            let bus: SharedBus = bridge.clone();
            (Backend::Bridge(bridge), bus)
        };

        let mut robot = Robot::from_config(&bus, config);
        if let Backend::Bridge(bridge) = &backend {
            let mut ids: Vec<_> = bridge.borrow().devices().map(|(id, _)| *id).collect();
            ids.sort_unstable();
            info!("Hardware bridge devices: {:?}", ids);
        }
        if let Some(routine) = &options.routine {
            robot.select_auto(routine);
        }
        robot.apply_mode(&ModeCommand {
            mode: options.initial_mode,
            routine: None,
        });

        Self {
            robot,
            backend,
            latest_input: OperatorInput::default(),
            input_received_at: None,
            input_stale: true,
            feedback_received_at: None,
            health: RuntimeHealth::InputStale, // Start stale until first input
            seq: 0,
            started,
        }
    }

    pub fn robot(&self) -> &Robot {
        &self.robot
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Process incoming operator input
    pub fn on_input(&mut self, input: OperatorInput, at: Instant) {
        debug!("Received operator input: {:?}", &input);
        self.latest_input = input;
        self.input_received_at = Some(at);
    }

    pub fn on_mode(&mut self, command: &ModeCommand) {
        info!("Received mode command: {:?}", command);
        self.robot.apply_mode(command);
    }

    /// Hand hardware feedback to the bus cache and the heading
    pub fn on_feedback(&mut self, frame: &MotorFeedbackFrame, at: Instant) {
        if let Backend::Bridge(bridge) = &self.backend {
            let mut bridge = bridge.borrow_mut();
            for motor in &frame.motors {
                bridge.apply_feedback(
                    motor.id,
                    Feedback {
                        position: motor.position,
                        velocity: motor.velocity,
                    },
                );
            }
        }
        self.robot.set_heading(frame.heading_deg);
        self.feedback_received_at = Some(at);
    }

    /// Input for this tick, neutral once the last sample is too old
    fn current_input(&mut self, now: Instant) -> OperatorInput {
        let age = self.input_received_at.map(|at| now.saturating_duration_since(at));
        let stale = age.is_none_or(|age| age > CMD_TIMEOUT);
        if let Some(age) = age {
            if stale && !self.input_stale {
                warn!("Operator input stale ({:?} old), releasing controls", age);
            } else if !stale && self.input_stale {
                info!("Operator input resumed");
            }
        }
        self.input_stale = stale;

        if stale {
            OperatorInput::default()
        } else {
            self.latest_input
        }
    }

    fn feedback_stale(&self, now: Instant) -> bool {
        match (&self.backend, self.feedback_received_at) {
            (Backend::Sim(_), _) => false,
            (Backend::Bridge(_), Some(at)) => now.saturating_duration_since(at) > CMD_TIMEOUT,
            (Backend::Bridge(_), None) => true,
        }
    }

    /// Run one control tick at `now`
    pub fn tick(&mut self, now: Instant) -> TickOutput {
        let input = self.current_input(now);

        let health = if self.feedback_stale(now) {
            // Old samples no longer describe the hardware
            if let Backend::Bridge(bridge) = &self.backend {
                bridge.borrow_mut().clear_feedback();
            }
            RuntimeHealth::FeedbackStale
        } else if self.input_stale {
            RuntimeHealth::InputStale
        } else {
            RuntimeHealth::Ok
        };
        if health != self.health {
            info!("Health: {:?}", health);
        }
        self.health = health;

        let telemetry = self
            .robot
            .tick(&input, now.saturating_duration_since(self.started));

        let frame = match &self.backend {
            Backend::Bridge(bridge) => {
                let (commands, resets) = bridge.borrow_mut().take_frame();
                self.seq += 1;
                Some(MotorCommandFrame {
                    seq: self.seq,
                    commands,
                    resets,
                })
            }
            Backend::Sim(sim) => {
                sim.borrow_mut().step(tick_period().as_secs_f64());
                None
            }
        };

        TickOutput {
            frame,
            telemetry,
            health,
        }
    }
}

pub async fn run(
    config: RobotConfig,
    options: RuntimeOptions,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_operator = session.declare_subscriber(TOPIC_CMD_OPERATOR).await?;
    let sub_mode = session.declare_subscriber(TOPIC_CMD_MODE).await?;
    let sub_feedback = session.declare_subscriber(TOPIC_STATE_MOTORS).await?;
    let pub_motors = session.declare_publisher(TOPIC_RT_MOTORS).await?;
    let pub_telemetry = session.declare_publisher(TOPIC_TELEMETRY).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut runtime = Runtime::new(&config, &options, Instant::now());
    let mut tick = interval(tick_period());

    info!(
        "Runtime started: {}Hz loop, {}ms input timeout, {} bus",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis(),
        if options.sim { "simulated" } else { "bridge" }
    );
    info!(
        "Subscribed to: {}, {}, {}",
        TOPIC_CMD_OPERATOR, TOPIC_CMD_MODE, TOPIC_STATE_MOTORS
    );
    info!(
        "Publishing to: {}, {}, {}",
        TOPIC_RT_MOTORS, TOPIC_TELEMETRY, TOPIC_HEALTH
    );

    loop {
        tick.tick().await;
        let now = Instant::now();

        // 1. Drain pending samples (non-blocking), keep latest
        while let Ok(Some(sample)) = sub_feedback.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<MotorFeedbackFrame>(&payload) {
                Ok(frame) => runtime.on_feedback(&frame, now),
                Err(e) => warn!("Failed to parse motor feedback: {}", e),
            }
        }
        while let Ok(Some(sample)) = sub_mode.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<ModeCommand>(&payload) {
                Ok(command) => runtime.on_mode(&command),
                Err(e) => warn!("Failed to parse mode command: {}", e),
            }
        }
        while let Ok(Some(sample)) = sub_operator.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<OperatorInput>(&payload) {
                Ok(input) => runtime.on_input(input, now),
                Err(e) => warn!("Failed to parse operator input: {}", e),
            }
        }

        // 2. Run the robot
        let output = runtime.tick(now);

        // 3. Publish motor frame
        if let Some(frame) = &output.frame {
            let frame_json = serde_json::to_string(frame)?;
            pub_motors.put(frame_json).await?;
        }

        // 4. Publish telemetry and health
        let telemetry_json = serde_json::to_string(&output.telemetry)?;
        pub_telemetry.put(telemetry_json).await?;
        let health_json = serde_json::to_string(&output.health)?;
        pub_health.put(health_json).await?;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::actuator::Demand;
    use crate::messages::MotorFeedback;

    fn bridge_runtime(mode: RobotMode) -> (Runtime, Instant) {
        let start = Instant::now();
        let options = RuntimeOptions {
            initial_mode: mode,
            ..RuntimeOptions::default()
        };
        (Runtime::new(&RobotConfig::default(), &options, start), start)
    }

    fn feedback(heading_deg: Option<f64>) -> MotorFeedbackFrame {
        MotorFeedbackFrame {
            motors: vec![MotorFeedback {
                id: 1,
                position: 12.0,
                velocity: 0.0,
            }],
            heading_deg,
        }
    }

    #[test]
    fn test_starts_stale_without_input() {
        let (mut runtime, start) = bridge_runtime(RobotMode::Teleop);
        runtime.on_feedback(&feedback(None), start);
        let output = runtime.tick(start);
        assert_eq!(output.health, RuntimeHealth::InputStale);
    }

    #[test]
    fn test_fresh_input_drives_wheels() {
        let (mut runtime, start) = bridge_runtime(RobotMode::Teleop);
        let mut input = OperatorInput::default();
        input.driver.left_y = -1.0;
        runtime.on_feedback(&feedback(None), start);
        runtime.on_input(input, start);

        let output = runtime.tick(start + Duration::from_millis(20));
        assert_eq!(output.health, RuntimeHealth::Ok);
        let frame = output.frame.unwrap();
        assert_eq!(frame.seq, 1);
        let fl = frame.commands.iter().find(|cmd| cmd.id == 1).unwrap();
        assert_eq!(fl.demand, Demand::PercentOutput(1.0));
    }

    #[test]
    fn test_stale_input_releases_controls() {
        let (mut runtime, start) = bridge_runtime(RobotMode::Teleop);
        let mut input = OperatorInput::default();
        input.driver.left_y = -1.0;
        runtime.on_input(input, start);

        let later = start + CMD_TIMEOUT + Duration::from_millis(20);
        runtime.on_feedback(&feedback(None), later);
        let output = runtime.tick(later);
        assert_eq!(output.health, RuntimeHealth::InputStale);
        assert_eq!(output.telemetry.forward, 0.0);
        assert_eq!(output.telemetry.wheel_outputs, [0.0; 4]);
    }

    #[test]
    fn test_missing_feedback_reported() {
        let (mut runtime, start) = bridge_runtime(RobotMode::Teleop);
        runtime.on_input(OperatorInput::default(), start);
        assert_eq!(runtime.tick(start).health, RuntimeHealth::FeedbackStale);
    }

    #[test]
    fn test_feedback_reaches_telemetry() {
        let (mut runtime, start) = bridge_runtime(RobotMode::Teleop);
        runtime.on_feedback(&feedback(Some(45.0)), start);
        let output = runtime.tick(start);
        assert_eq!(output.telemetry.wheel_positions[0], Some(12.0));
        assert_eq!(output.telemetry.heading_deg, Some(45.0));
    }

    #[test]
    fn test_silent_bridge_reads_unavailable_and_autonomous_finishes() {
        let (mut runtime, start) = bridge_runtime(RobotMode::Disabled);
        runtime.on_mode(&ModeCommand {
            mode: RobotMode::Autonomous,
            routine: Some("Auto 2".to_string()),
        });

        let mut finished = false;
        for i in 0..1500 {
            let output = runtime.tick(start + tick_period() * i);
            assert_eq!(output.health, RuntimeHealth::FeedbackStale);
            assert_eq!(output.telemetry.wheel_positions, [None; 4]);
            if !runtime.robot().is_autonomous_running() {
                finished = true;
                break;
            }
        }
        assert!(finished, "Unmeasurable waits must not hold the routine");
    }

    #[test]
    fn test_expired_feedback_is_dropped() {
        let (mut runtime, start) = bridge_runtime(RobotMode::Teleop);
        runtime.on_feedback(&feedback(None), start);
        assert_eq!(runtime.tick(start).telemetry.wheel_positions[0], Some(12.0));

        let later = start + CMD_TIMEOUT + Duration::from_millis(20);
        let output = runtime.tick(later);
        assert_eq!(output.health, RuntimeHealth::FeedbackStale);
        assert_eq!(output.telemetry.wheel_positions[0], None);

        runtime.on_feedback(&feedback(None), later);
        assert_eq!(runtime.tick(later).telemetry.wheel_positions[0], Some(12.0));
    }

    #[test]
    fn test_mode_command_starts_routine() {
        let (mut runtime, start) = bridge_runtime(RobotMode::Disabled);
        runtime.on_mode(&ModeCommand {
            mode: RobotMode::Autonomous,
            routine: Some("Auto 1".to_string()),
        });
        let output = runtime.tick(start);
        assert_eq!(output.telemetry.mode, RobotMode::Autonomous);
        assert_eq!(output.telemetry.routine.as_deref(), Some("Auto 1 - Shoot Only"));
        let frame = output.frame.unwrap();
        assert!(
            frame.resets.iter().any(|reset| reset.id == 1 && reset.position == 0.0),
            "Drive encoder reset should ride along with the first frame"
        );
    }

    #[test]
    fn test_sim_backend_publishes_no_frames() {
        let start = Instant::now();
        let options = RuntimeOptions {
            initial_mode: RobotMode::Teleop,
            sim: true,
            ..RuntimeOptions::default()
        };
        let mut runtime = Runtime::new(&RobotConfig::default(), &options, start);
        runtime.on_input(OperatorInput::default(), start);
        let output = runtime.tick(start);
        assert_eq!(output.frame, None);
        assert_eq!(output.health, RuntimeHealth::Ok);
    }
}
