// Keyboard driver station: WASD move, Z/X rotate, R/F speed, Q quit
//
// Mechanisms: I intake, H high shot, L low shot (each latches until pressed
// again), Space fire while held, 0 pivot re-zero.
// Toggles: M drive mode, C field-centric, G zero heading.
// Modes: T teleop, O autonomous (selected routine), P disabled.
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use tracing::info;

use mecanum_motion_core::config::{TOPIC_CMD_MODE, TOPIC_CMD_OPERATOR};
use mecanum_motion_core::messages::{ModeCommand, OperatorInput, RobotMode};

const SPEEDS: [f64; 3] = [0.4, 0.7, 1.0]; // stick deflection
const INPUT_TIMEOUT_MS: u64 = 100; // Release keys after this much time with no repeat

// A key that counts as held while the terminal keeps repeating it
#[derive(Default)]
struct HeldKey(Option<Instant>);

impl HeldKey {
    fn press(&mut self) {
        self.0 = Some(Instant::now());
    }

    fn is_held(&self) -> bool {
        self.0
            .is_some_and(|at| at.elapsed() <= Duration::from_millis(INPUT_TIMEOUT_MS))
    }
}

// Operator button latched on by a single key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Latched {
    Intake,
    High,
    Low,
}

#[derive(Default)]
struct Keys {
    latched: Option<Latched>,
    fire: HeldKey,
    rezero: HeldKey,
    // One-shot presses, sent for a single frame
    toggle_mode: bool,
    toggle_field_centric: bool,
    zero_heading: bool,
}

impl Keys {
    fn latch(&mut self, button: Latched) {
        self.latched = if self.latched == Some(button) {
            None
        } else {
            Some(button)
        };
        info!("Latched: {:?}", self.latched);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let pub_input = session.declare_publisher(TOPIC_CMD_OPERATOR).await?;
    let pub_mode = session.declare_publisher(TOPIC_CMD_MODE).await?;

    info!("Controls: WASD=move, Z/X=rotate, R/F=speed, Q=quit");
    info!("Mechanisms: I=intake, H=high, L=low, Space=fire, 0=re-zero pivot");
    info!("Toggles: M=drive mode, C=field-centric, G=zero heading; T/O/P=teleop/auto/disable");

    enable_raw_mode()?;
    let result = run_station(&pub_input, &pub_mode).await;
    disable_raw_mode()?;

    result
}

async fn run_station(
    pub_input: &zenoh::pubsub::Publisher<'_>,
    pub_mode: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;
    let mut keys = Keys::default();

    // Persistent stick state
    let mut forward = 0.0;
    let mut strafe = 0.0;
    let mut rotate = 0.0;
    let mut last_movement_input = Instant::now();

    loop {
        let mut mode = None;

        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    // Movement - update sticks and refresh timestamp
                    KeyCode::Char('w') if pressed => {
                        forward = SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        forward = -SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('a') if pressed => {
                        strafe = SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        strafe = -SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }

                    // Rotation
                    KeyCode::Char('z') if pressed => {
                        rotate = SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('x') if pressed => {
                        rotate = -SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }

                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(2);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    // Mechanisms
                    KeyCode::Char('i') if kind == KeyEventKind::Press => {
                        keys.latch(Latched::Intake)
                    }
                    KeyCode::Char('h') if kind == KeyEventKind::Press => keys.latch(Latched::High),
                    KeyCode::Char('l') if kind == KeyEventKind::Press => keys.latch(Latched::Low),
                    KeyCode::Char(' ') if pressed => keys.fire.press(),
                    KeyCode::Char('0') if pressed => keys.rezero.press(),

                    // Toggles
                    KeyCode::Char('m') if kind == KeyEventKind::Press => keys.toggle_mode = true,
                    KeyCode::Char('c') if kind == KeyEventKind::Press => {
                        keys.toggle_field_centric = true
                    }
                    KeyCode::Char('g') if kind == KeyEventKind::Press => keys.zero_heading = true,

                    // Modes
                    KeyCode::Char('t') if kind == KeyEventKind::Press => {
                        mode = Some(RobotMode::Teleop)
                    }
                    KeyCode::Char('o') if kind == KeyEventKind::Press => {
                        mode = Some(RobotMode::Autonomous)
                    }
                    KeyCode::Char('p') if kind == KeyEventKind::Press => {
                        mode = Some(RobotMode::Disabled)
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        // Reset sticks if no movement input for INPUT_TIMEOUT_MS
        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            forward = 0.0;
            strafe = 0.0;
            rotate = 0.0;
        }

        if let Some(mode) = mode {
            info!("Mode: {:?}", mode);
            let cmd = ModeCommand {
                mode,
                routine: None,
            };
            pub_mode.put(serde_json::to_string(&cmd)?).await?;
        }

        // Gamepad Y axes point toward the operator
        let mut input = OperatorInput::default();
        input.driver.left_y = -forward;
        input.driver.left_x = -strafe;
        input.driver.right_x = -rotate;
        input.driver.start = std::mem::take(&mut keys.toggle_mode);
        input.driver.back = std::mem::take(&mut keys.toggle_field_centric);
        input.operator.start = std::mem::take(&mut keys.zero_heading);
        input.operator.a = keys.latched == Some(Latched::Intake);
        input.operator.b = keys.latched == Some(Latched::High);
        input.operator.x = keys.latched == Some(Latched::Low);
        input.operator.right_bumper = keys.fire.is_held();
        input.operator.left_bumper = keys.rezero.is_held();

        // Always publish at ~50Hz
        pub_input.put(serde_json::to_string(&input)?).await?;
    }

    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
