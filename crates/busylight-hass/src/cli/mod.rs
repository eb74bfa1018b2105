//! CLI subcommands.

mod config_cmd;
mod devices;
mod run;

use std::path::Path;

use clap::Subcommand;
use serde::Serialize;

pub(super) use busylight_hass_lib::config::Config;
pub(super) use busylight_hass_lib::device::{self, BusyLight, DiscoveredLight};
pub(super) use busylight_hass_lib::error::Result;

pub use run::RunArgs;

const PADDING: usize = 2;

/// Compute alignment width for a command's key-value output.
/// Ensures at least PADDING spaces after the longest key in either level,
/// with top-level and indent values aligned to the same column.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top_max = top.iter().map(|k| k.len()).max().unwrap_or(0);
    let indent_max = indent.iter().map(|k| k.len()).max().unwrap_or(0);
    let top_need = if top.is_empty() { 0 } else { top_max + PADDING };
    // Indent keys lose 2 chars of inner width to the "  " prefix
    let indent_need = if indent.is_empty() {
        0
    } else {
        indent_max + PADDING + 2
    };
    top_need.max(indent_need)
}

pub(super) fn format_kv(key: &str, value: impl std::fmt::Display, w: usize) -> String {
    format!("{key:<width$}{value}", width = w)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{}", format_kv(key, value, w));
}

pub(super) fn kv_indent(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("  {}", format_kv(key, value, w - 2));
}

/// Load the config from `custom_path` or the default location.
pub fn load_config(custom_path: Option<&Path>) -> (Config, Vec<String>) {
    match custom_path {
        Some(path) => Config::load_from(path),
        None => Config::load_with_warnings(),
    }
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: Config,
    pub problems: Vec<String>,
}

#[derive(Serialize)]
pub(super) struct DevicesOutput {
    pub count: usize,
    pub devices: Vec<DiscoveredLight>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Bridge the light at PATH to the MQTT broker
    Run(RunArgs),

    /// Show current configuration and file path
    Config,

    /// List attached busylights and their paths
    Devices,
}

/// Warn if `--json` was passed to a command that doesn't support it.
fn warn_json_unsupported(cmd_name: &str) {
    log::warn!("--json is not supported for `{cmd_name}` (ignored)");
}

pub fn run(cmd: Command, config: Config, config_path: Option<&Path>, json: bool) -> Result<()> {
    match cmd {
        Command::Run(args) => {
            if json {
                warn_json_unsupported("run");
            }
            run::cmd_run(args, config)
        }
        Command::Config => config_cmd::cmd_config(&config, config_path, json),
        Command::Devices => devices::cmd_devices(json),
    }
}
