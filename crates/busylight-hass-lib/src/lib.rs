//! busylight-hass: expose a USB busylight to Home Assistant as an MQTT light.

pub mod command;
pub mod config;
pub mod device;
pub mod discovery;
pub mod error;
pub mod led;
pub mod models;
pub mod protocol;
pub mod reconnect;
pub mod session;
pub mod state;
pub mod topic;

pub use error::BridgeError;
