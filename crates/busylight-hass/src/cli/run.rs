//! `run` subcommand: bridge the light to the broker until Ctrl+C.

use std::time::Duration;

use busylight_hass_lib::BridgeError;
use busylight_hass_lib::config;
use busylight_hass_lib::led;
use busylight_hass_lib::session::{BrokerSettings, Bridge, RumqttConnector, Supervisor};
use clap::Args;
use log::{debug, info};
use tokio::sync::watch;

use super::{BusyLight, Config, Result, device};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Light's USB path, e.g. usb:001/004 (see `devices`)
    pub path: String,

    /// Start with the light on (default)
    #[arg(long, alias = "no-off", overrides_with = "off")]
    pub on: bool,

    /// Start with the light off
    #[arg(short = 'o', long, alias = "no-on", overrides_with = "on")]
    pub off: bool,

    /// Delay reconnection attempts
    #[arg(long, value_name = "SECONDS")]
    pub reconnect: Option<f64>,

    /// Red level
    #[arg(long, value_name = "INTEGER")]
    pub red: Option<u8>,

    /// Green level
    #[arg(long, value_name = "INTEGER")]
    pub green: Option<u8>,

    /// Blue level
    #[arg(long, value_name = "INTEGER")]
    pub blue: Option<u8>,

    /// Initial and default brightness
    #[arg(long, value_name = "INTEGER")]
    pub brightness: Option<u8>,

    /// MQTT broker, host or host:port
    #[arg(long, value_name = "HOST")]
    pub mqttbroker: Option<String>,

    /// Tag for MQTT topics
    #[arg(long, alias = "mqtt_tag")]
    pub tag: Option<String>,

    /// MQTT user
    #[arg(long)]
    pub mqttuser: Option<String>,

    /// MQTT password
    #[arg(long)]
    pub mqttpassword: Option<String>,

    /// File containing the MQTT password
    #[arg(long, alias = "mqttpasswdfile", value_name = "FILENAME")]
    pub mqttpasswordfile: Option<String>,

    /// MQTT client identifier (default: derived from hostname and path)
    #[arg(long)]
    pub client_id: Option<String>,

    /// Publish the discovery document on every reconnect
    #[arg(long)]
    pub republish_discovery: bool,
}

impl RunArgs {
    /// Override config file values with the flags that were given.
    pub fn apply(&self, config: &mut Config) {
        if self.on {
            config.initially_on = true;
        }
        if self.off {
            config.initially_on = false;
        }
        if let Some(v) = self.reconnect {
            config.reconnect_delay = v;
        }
        if let Some(v) = self.red {
            config.red = v;
        }
        if let Some(v) = self.green {
            config.green = v;
        }
        if let Some(v) = self.blue {
            config.blue = v;
        }
        if let Some(v) = self.brightness {
            config.brightness = v;
        }
        if let Some(v) = &self.mqttbroker {
            config.broker = v.clone();
        }
        if let Some(v) = &self.tag {
            config.tag = v.clone();
        }
        if let Some(v) = &self.mqttuser {
            config.username = v.clone();
        }
        if let Some(v) = &self.mqttpassword {
            config.password = v.clone();
        }
        if let Some(v) = &self.mqttpasswordfile {
            config.password_file = v.clone();
        }
        if let Some(v) = &self.client_id {
            config.client_id = v.clone();
        }
        if self.republish_discovery {
            config.republish_discovery = true;
        }
    }
}

pub(super) fn cmd_run(args: RunArgs, mut config: Config) -> Result<()> {
    args.apply(&mut config);
    if let Err(errors) = config.validate() {
        let problems: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err(BridgeError::Config(problems.join("; ")));
    }

    let light = device::open_light(&args.path)?;
    info!(
        "using light {} with {} LEDs",
        light.identity(),
        light.led_count()
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(bridge(&light, &config, &args.path))
}

async fn bridge(light: &device::PlatformLight, config: &Config, path: &str) -> Result<()> {
    let state = config.initial_state();
    if state.on {
        let rgb = state.colour.effective_rgb();
        led::sweep(light, rgb, led::STARTUP_SWEEP_STEP).await?;
        debug!("flashed {path} colour={rgb}");
    }

    let Some(endpoint) = config.broker_endpoint() else {
        info!("no broker configured, leaving the light in its initial state");
        light.set_color(state.target_rgb(), None)?;
        return Ok(());
    };
    let (host, port) = endpoint.map_err(BridgeError::Config)?;

    let settings = BrokerSettings {
        host: host.clone(),
        port,
        client_id: config.client_id_for(&config::hostname(), path),
        username: Some(config.username.clone()).filter(|u| !u.is_empty()),
        password: config.resolve_password()?,
        keep_alive: Duration::from_secs(config.keep_alive),
    };
    info!(
        "mqtt client host={host} port={port} user={} client_id={}",
        settings.username.as_deref().unwrap_or("-"),
        settings.client_id
    );

    let bridge = Bridge::new(light, &config.tag, state, config.republish_discovery);
    let connector = RumqttConnector::new(settings, &bridge.topics().availability);
    let mut supervisor = Supervisor::new(
        bridge,
        connector,
        config.reconnect_policy(),
        format!("{host}:{port}"),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, shutting down");
            shutdown_tx.send_replace(true);
        }
    });

    supervisor.run(shutdown_rx).await;
    Ok(())
}
