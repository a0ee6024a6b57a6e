use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mecanum_motion_core::config::{RobotConfig, CONFIG_FILE_NAME};
use mecanum_motion_core::messages::RobotMode;
use mecanum_motion_core::runtime::{self, RuntimeOptions};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Disabled,
    Autonomous,
    Teleop,
}

impl From<ModeArg> for RobotMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Disabled => RobotMode::Disabled,
            ModeArg::Autonomous => RobotMode::Autonomous,
            ModeArg::Teleop => RobotMode::Teleop,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "mecanum-motion-core")]
#[command(about = "Mecanum drive and mechanism control loop over zenoh", long_about = None)]
struct Args {
    /// Robot config file (JSON); built-in defaults when omitted and absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mode to enter at startup
    #[arg(short, long, value_enum, default_value_t = ModeArg::Disabled)]
    mode: ModeArg,

    /// Autonomous routine, e.g. "Auto 3 Right"
    #[arg(short, long)]
    auto: Option<String>,

    /// Drive the in-process simulated motors instead of a hardware bridge
    #[arg(long)]
    sim: bool,
}

fn load_config(
    path: Option<&Path>,
) -> Result<RobotConfig, Box<dyn std::error::Error + Send + Sync>> {
    match path {
        Some(path) => Ok(RobotConfig::load(path)?),
        None if Path::new(CONFIG_FILE_NAME).exists() => Ok(RobotConfig::load(CONFIG_FILE_NAME)?),
        None => {
            info!("No {} found, using built-in defaults", CONFIG_FILE_NAME);
            Ok(RobotConfig::default())
        }
    }
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init(); // installs the subscriber globally

    let args = Args::parse();
    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(1);
        }
    };

    let options = RuntimeOptions {
        initial_mode: args.mode.into(),
        routine: args.auto,
        sim: args.sim,
    };

    if let Err(e) = runtime::run(config, options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
