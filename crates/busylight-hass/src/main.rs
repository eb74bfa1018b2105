//! busylight-hass: expose a USB busylight to Home Assistant as an MQTT light.

use std::path::PathBuf;

use busylight_hass_lib::BridgeError;
use busylight_hass_lib::config::parse_log_level;
use busylight_hass_lib::device::DeviceError;
use clap::Parser;

mod cli;

/// Exit status when no supported light is found at the given path.
const EXIT_NO_LIGHT: i32 = 2;
/// Exit status for an invalid log level or configuration.
const EXIT_BAD_CONFIG: i32 = 3;

#[derive(Parser)]
#[command(
    name = "busylight-hass",
    version,
    about = "Link a USB busylight and Home Assistant with MQTT"
)]
struct Args {
    /// Config file (default: platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug logging (same as --loglevel debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Logging level: off, error, warn, info, debug, trace
    #[arg(short = 'l', long = "loglevel", global = true, value_name = "LEVEL")]
    loglevel: Option<String>,

    /// Output as JSON (for config, devices)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: cli::Command,
}

fn exit_code(error: &BridgeError) -> i32 {
    match error {
        BridgeError::Device(
            DeviceError::NotFound(_)
            | DeviceError::InvalidPath(_)
            | DeviceError::UnsupportedDevice(_),
        ) => EXIT_NO_LIGHT,
        BridgeError::Config(_) => EXIT_BAD_CONFIG,
        _ => 1,
    }
}

fn main() {
    let args = Args::parse();

    let (config, warnings) = cli::load_config(args.config.as_deref());

    let level_name = if args.verbose {
        "debug".to_string()
    } else {
        args.loglevel
            .clone()
            .unwrap_or_else(|| config.log_level.clone())
    };
    let Some(level) = parse_log_level(&level_name) else {
        eprintln!("Invalid log level: {level_name}");
        std::process::exit(EXIT_BAD_CONFIG);
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_str()))
        .format_timestamp(None)
        .format_target(false)
        .init();

    for w in &warnings {
        log::warn!("{w}");
    }

    if let Err(e) = cli::run(args.command, config, args.config.as_deref(), args.json) {
        eprintln!("Error: {e}");
        std::process::exit(exit_code(&e));
    }
}
