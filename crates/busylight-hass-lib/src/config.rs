//! Application configuration: TOML file, platform config directory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::led::Colour;
use crate::reconnect::{BackoffConfig, ExponentialBackoff, FixedDelay, ReconnectPolicy};
use crate::state::LightState;
use crate::topic::DEFAULT_TAG;

/// Default MQTT port when `broker` has none.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Brokers commonly limit client identifiers to this many characters.
pub const MAX_CLIENT_ID_LEN: usize = 23;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// MQTT broker as `host` or `host:port`. Empty = drive the light only.
    #[serde(default)]
    pub broker: String,

    #[serde(default)]
    pub username: String,

    /// Broker password. Takes precedence over `password_file`.
    #[serde(default)]
    pub password: String,

    /// File whose first line is the broker password.
    #[serde(default)]
    pub password_file: String,

    /// MQTT client identifier. Empty = derived from hostname and light path.
    #[serde(default)]
    pub client_id: String,

    /// First level of every per-light topic.
    #[serde(default = "default_tag")]
    pub tag: String,

    /// Seconds to wait before reconnecting to the broker.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: f64,

    /// Upper bound for exponential backoff, in seconds. At or below
    /// `reconnect_delay` the delay is fixed.
    #[serde(default)]
    pub reconnect_max_delay: f64,

    /// MQTT keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive: u64,

    #[serde(default = "default_true")]
    pub initially_on: bool,

    #[serde(default = "default_red")]
    pub red: u8,
    #[serde(default)]
    pub green: u8,
    #[serde(default)]
    pub blue: u8,
    #[serde(default = "default_brightness")]
    pub brightness: u8,

    /// Publish the discovery document on every connection, not just the first.
    #[serde(default)]
    pub republish_discovery: bool,

    /// Log level when neither `-v` nor `--loglevel` is given.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_tag() -> String {
    DEFAULT_TAG.into()
}
fn default_reconnect_delay() -> f64 {
    10.0
}
fn default_keep_alive() -> u64 {
    60
}
fn default_true() -> bool {
    true
}
fn default_red() -> u8 {
    255
}
fn default_brightness() -> u8 {
    255
}
fn default_log_level() -> String {
    "warn".into()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            broker: String::new(),
            username: String::new(),
            password: String::new(),
            password_file: String::new(),
            client_id: String::new(),
            tag: default_tag(),
            reconnect_delay: default_reconnect_delay(),
            reconnect_max_delay: 0.0,
            keep_alive: default_keep_alive(),
            initially_on: true,
            red: default_red(),
            green: 0,
            blue: 0,
            brightness: default_brightness(),
            republish_discovery: false,
            log_level: default_log_level(),
        }
    }
}

/// Validation errors that [`Config::validate`] can return.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// `field` is `"reconnect_delay"` or `"reconnect_max_delay"`.
    InvalidDelay { field: &'static str, reason: String },
    InvalidTag(String),
    InvalidBroker(String),
    InvalidLogLevel(String),
    ZeroKeepAlive,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidDelay { field, reason } => {
                write!(f, "Invalid {field}: {reason}")
            }
            ValidationError::InvalidTag(e) => write!(f, "Invalid tag: {e}"),
            ValidationError::InvalidBroker(e) => write!(f, "Invalid broker: {e}"),
            ValidationError::InvalidLogLevel(level) => write!(f, "Invalid log level: {level}"),
            ValidationError::ZeroKeepAlive => write!(f, "keep_alive must be at least 1 second"),
        }
    }
}

/// Parse a log level name (case-insensitive).
///
/// Accepts the `log` crate names plus `warning`, `critical` and `fatal`.
pub fn parse_log_level(name: &str) -> Option<LevelFilter> {
    match name.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "critical" | "fatal" | "error" => Some(LevelFilter::Error),
        "warning" | "warn" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// Split `host[:port]` (IPv6 literals in brackets), defaulting the port.
pub fn parse_broker(broker: &str) -> Result<(String, u16), String> {
    let broker = broker.trim();
    if broker.is_empty() {
        return Err("empty host".into());
    }

    let (host, port) = if let Some(rest) = broker.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| format!("unterminated '[' in {broker}"))?;
        (host, tail.strip_prefix(':'))
    } else {
        match broker.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => (host, Some(port)),
            // Bare IPv6 literal, no port.
            Some(_) => (broker, None),
            None => (broker, None),
        }
    };

    if host.is_empty() {
        return Err(format!("missing host in {broker}"));
    }
    let port = match port {
        None => DEFAULT_MQTT_PORT,
        Some(p) => match p.parse::<u16>() {
            Ok(0) | Err(_) => return Err(format!("bad port '{p}' in {broker}")),
            Ok(n) => n,
        },
    };
    Ok((host.to_string(), port))
}

/// Read the first line of a password file, without its line ending.
pub fn read_password_file(path: &Path) -> std::io::Result<String> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents.lines().next().unwrap_or_default().to_string())
}

/// Derive an MQTT client identifier from the hostname and light path.
///
/// Path: lower-cased, `-` `:` `.` become `d` `c` `f`, other non-alphanumerics
/// become `z`. Hostname: lower-cased, non-alphanumerics become `y`. The
/// hostname plus `busylighthass` is cut so the whole id fits in
/// [`MAX_CLIENT_ID_LEN`] characters.
pub fn make_client_id(hostname: &str, device: &str) -> String {
    let device: String = device
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '-' => 'd',
            ':' => 'c',
            '.' => 'f',
            c if c.is_ascii_lowercase() || c.is_ascii_digit() => c,
            _ => 'z',
        })
        .collect();
    let host: String = hostname
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                'y'
            }
        })
        .collect();

    // Over-long paths keep their tail, which carries the bus address.
    let device = &device[device.len().saturating_sub(MAX_CLIENT_ID_LEN)..];
    let prefix: String = format!("{host}busylighthass")
        .chars()
        .take(MAX_CLIENT_ID_LEN - device.len())
        .collect();
    format!("{prefix}{device}")
}

/// This machine's hostname, or `localhost` if it cannot be read.
pub fn hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| "localhost".into())
}

impl Config {
    /// Platform-specific config directory.
    pub fn dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("busylight-hass"))
    }

    /// Full path to config file.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Load config from disk, or return defaults if not found.
    pub fn load() -> Self {
        let (config, warnings) = Self::load_with_warnings();
        for w in &warnings {
            log::warn!("{w}");
        }
        config
    }

    /// Load config from an arbitrary path, returning the config and any parse warnings.
    ///
    /// Returns `(defaults, [])` if the file doesn't exist.
    /// Returns `(defaults, [warning])` if the file exists but can't be parsed.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, vec![]),
                Err(e) => {
                    let warning = format!(
                        "config parse error ({}), using defaults: {e}",
                        path.display()
                    );
                    (Self::default(), vec![warning])
                }
            },
            Err(_) => (Self::default(), vec![]),
        }
    }

    /// Load config from the default path, returning the config and any parse warnings.
    pub fn load_with_warnings() -> (Self, Vec<String>) {
        let Some(path) = Self::path() else {
            return (Self::default(), vec![]);
        };
        Self::load_from(&path)
    }

    /// Validate the entire config, collecting all errors.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if !self.reconnect_delay.is_finite() || self.reconnect_delay < 0.0 {
            errors.push(ValidationError::InvalidDelay {
                field: "reconnect_delay",
                reason: format!("{} is not a non-negative number of seconds", self.reconnect_delay),
            });
        }
        if !self.reconnect_max_delay.is_finite() || self.reconnect_max_delay < 0.0 {
            errors.push(ValidationError::InvalidDelay {
                field: "reconnect_max_delay",
                reason: format!(
                    "{} is not a non-negative number of seconds",
                    self.reconnect_max_delay
                ),
            });
        }

        if self.tag.trim().is_empty() {
            errors.push(ValidationError::InvalidTag("tag cannot be empty".into()));
        } else if self.tag.contains(['/', '+', '#']) {
            errors.push(ValidationError::InvalidTag(format!(
                "'{}' contains '/', '+' or '#'",
                self.tag
            )));
        }

        if !self.broker.trim().is_empty()
            && let Err(e) = parse_broker(&self.broker)
        {
            errors.push(ValidationError::InvalidBroker(e));
        }

        if parse_log_level(&self.log_level).is_none() {
            errors.push(ValidationError::InvalidLogLevel(self.log_level.clone()));
        }

        if self.keep_alive == 0 {
            errors.push(ValidationError::ZeroKeepAlive);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Broker endpoint, or `None` when no broker is configured.
    pub fn broker_endpoint(&self) -> Option<std::result::Result<(String, u16), String>> {
        if self.broker.trim().is_empty() {
            None
        } else {
            Some(parse_broker(&self.broker))
        }
    }

    /// Password from `password`, else the first line of `password_file`.
    pub fn resolve_password(&self) -> std::io::Result<Option<String>> {
        if !self.password.is_empty() {
            return Ok(Some(self.password.clone()));
        }
        if self.password_file.is_empty() {
            return Ok(None);
        }
        log::debug!("reading password from {}", self.password_file);
        read_password_file(Path::new(&self.password_file)).map(Some)
    }

    /// Configured client id, or one derived from `hostname` and `device`.
    pub fn client_id_for(&self, hostname: &str, device: &str) -> String {
        if self.client_id.is_empty() {
            make_client_id(hostname, device)
        } else {
            self.client_id.clone()
        }
    }

    pub fn initial_colour(&self) -> Colour {
        Colour::new(self.red, self.green, self.blue, self.brightness)
    }

    pub fn initial_state(&self) -> LightState {
        LightState::new(self.initially_on, self.initial_colour())
    }

    fn reconnect_delay_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.reconnect_delay)
            .unwrap_or(Duration::from_secs_f64(default_reconnect_delay()))
    }

    /// Fixed delay, or exponential backoff when `reconnect_max_delay` exceeds
    /// `reconnect_delay`.
    pub fn reconnect_policy(&self) -> Box<dyn ReconnectPolicy> {
        let initial_delay = self.reconnect_delay_duration();
        match Duration::try_from_secs_f64(self.reconnect_max_delay) {
            Ok(max_delay) if max_delay > initial_delay => {
                Box::new(ExponentialBackoff::new(BackoffConfig {
                    initial_delay,
                    max_delay,
                    ..BackoffConfig::default()
                }))
            }
            _ => Box::new(FixedDelay(initial_delay)),
        }
    }
}
