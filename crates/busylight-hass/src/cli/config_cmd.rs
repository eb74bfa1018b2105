//! `config` subcommand: show effective configuration and file path.

use std::path::Path;

use busylight_hass_lib::BridgeError;
use busylight_hass_lib::config::parse_broker;

use super::{Config, ConfigOutput, Result, kv, kv_indent, kv_width};

const REDACTED: &str = "********";

/// Copy of `config` safe to print.
fn redacted(config: &Config) -> Config {
    let mut shown = config.clone();
    if !shown.password.is_empty() {
        shown.password = REDACTED.into();
    }
    shown
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() { "(not set)" } else { value }
}

pub(super) fn cmd_config(config: &Config, custom_path: Option<&Path>, json: bool) -> Result<()> {
    let config_path = custom_path.map(|p| p.to_path_buf()).or_else(Config::path);
    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());
    let problems: Vec<String> = match config.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
    };

    if json {
        let output = ConfigOutput {
            config_file: config_path.as_ref().map(|p| p.display().to_string()),
            config_file_exists: config_exists,
            settings: redacted(config),
            problems,
        };
        let text = serde_json::to_string_pretty(&output)
            .map_err(|e| BridgeError::Io(e.into()))?;
        println!("{text}");
        return Ok(());
    }

    // Human-readable output
    let w = kv_width(
        &["Config file:"],
        &[
            "broker:",
            "username:",
            "password:",
            "password_file:",
            "client_id:",
            "tag:",
            "reconnect_delay:",
            "reconnect_max_delay:",
            "keep_alive:",
            "initially_on:",
            "colour:",
            "republish_discovery:",
            "log_level:",
        ],
    );

    match &config_path {
        Some(p) if config_exists => kv("Config file:", format_args!("{} (loaded)", p.display()), w),
        Some(p) => kv(
            "Config file:",
            format_args!("{} (not found, using defaults)", p.display()),
            w,
        ),
        None => kv("Config file:", "(no config directory)", w),
    }
    println!();

    println!("Settings:");
    let broker = match parse_broker(&config.broker) {
        _ if config.broker.is_empty() => "(none, light only)".to_string(),
        Ok((host, port)) => format!("{host} port {port}"),
        Err(e) => format!("{} (invalid: {e})", config.broker),
    };
    kv_indent("broker:", broker, w);
    kv_indent("username:", or_unset(&config.username), w);
    kv_indent(
        "password:",
        if config.password.is_empty() { "(not set)" } else { REDACTED },
        w,
    );
    kv_indent("password_file:", or_unset(&config.password_file), w);
    kv_indent(
        "client_id:",
        if config.client_id.is_empty() { "(derived)" } else { config.client_id.as_str() },
        w,
    );
    kv_indent("tag:", &config.tag, w);
    kv_indent("reconnect_delay:", format_args!("{}s", config.reconnect_delay), w);
    if config.reconnect_max_delay > config.reconnect_delay {
        kv_indent(
            "reconnect_max_delay:",
            format_args!("{}s (exponential backoff)", config.reconnect_max_delay),
            w,
        );
    } else {
        kv_indent("reconnect_max_delay:", "(fixed delay)", w);
    }
    kv_indent("keep_alive:", format_args!("{}s", config.keep_alive), w);
    kv_indent("initially_on:", config.initially_on, w);
    let colour = config.initial_colour();
    kv_indent(
        "colour:",
        format_args!("{colour} -> {}", colour.effective_rgb()),
        w,
    );
    kv_indent("republish_discovery:", config.republish_discovery, w);
    kv_indent("log_level:", &config.log_level, w);

    if !problems.is_empty() {
        println!();
        println!("Problems:");
        for p in &problems {
            println!("  {p}");
        }
    }

    Ok(())
}
