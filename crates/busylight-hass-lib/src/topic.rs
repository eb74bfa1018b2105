//! MQTT topic names derived from the light's USB identity.
//!
//! Per-light topics are `{tag}/{vid}/{pid}/{serial}/{suffix}` with the IDs as
//! `0x`-prefixed lowercase hex. The same light always maps to the same topics.

use crate::device::DeviceIdentity;

/// Default first topic level.
pub const DEFAULT_TAG: &str = "busylight_hass";

/// Discovery prefix Home Assistant listens on.
pub const DISCOVERY_PREFIX: &str = "homeassistant";

pub const AVAILABILITY_ONLINE: &str = "online";
pub const AVAILABILITY_OFFLINE: &str = "offline";

/// The three per-light topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet {
    pub availability: String,
    pub state: String,
    pub command: String,
}

impl TopicSet {
    pub fn new(identity: &DeviceIdentity, tag: &str) -> Self {
        TopicSet {
            availability: build_topic(identity, tag, "availability"),
            state: build_topic(identity, tag, "state"),
            command: build_topic(identity, tag, "command"),
        }
    }
}

/// Serial number with everything outside `[A-Za-z0-9]` replaced by `-`.
fn topic_serial(serial: &str) -> String {
    serial
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

pub fn build_topic(identity: &DeviceIdentity, tag: &str, suffix: &str) -> String {
    format!(
        "{tag}/{:#x}/{:#x}/{}/{suffix}",
        identity.vendor_id,
        identity.product_id,
        topic_serial(&identity.serial_number)
    )
}

/// Stable identifier used for the hub's unique id and discovery topic.
///
/// `{vid:x}dx{pid:x}dx{serial}` with the serial lower-cased and every
/// character outside `[a-z0-9]` replaced by `y`.
pub fn identifier(identity: &DeviceIdentity) -> String {
    let serial: String = identity
        .serial_number
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
    format!(
        "{:x}dx{:x}dx{serial}",
        identity.vendor_id, identity.product_id
    )
}

pub fn discovery_topic(tag: &str, identifier: &str) -> String {
    format!("{DISCOVERY_PREFIX}/light/{tag}/{identifier}/config")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(serial: &str) -> DeviceIdentity {
        DeviceIdentity {
            vendor_id: 0x04d8,
            product_id: 0xf372,
            serial_number: serial.into(),
            manufacturer: "Microchip Technology Inc.".into(),
            product: "LUXAFOR FLAG".into(),
            release_number: 0x0100,
        }
    }

    #[test]
    fn topic_layout() {
        let id = identity("ABC123");
        assert_eq!(
            build_topic(&id, DEFAULT_TAG, "state"),
            "busylight_hass/0x4d8/0xf372/ABC123/state"
        );
    }

    #[test]
    fn topic_sanitizes_serial() {
        let id = identity("a b/c+d#e.f");
        assert_eq!(
            build_topic(&id, "t", "command"),
            "t/0x4d8/0xf372/a-b-c-d-e-f/command"
        );
    }

    #[test]
    fn topic_set_suffixes() {
        let topics = TopicSet::new(&identity("X1"), "office");
        assert!(topics.availability.ends_with("/X1/availability"));
        assert!(topics.state.ends_with("/X1/state"));
        assert!(topics.command.ends_with("/X1/command"));
        assert!(topics.command.starts_with("office/"));
    }

    #[test]
    fn identifier_format() {
        assert_eq!(identifier(&identity("ABC123")), "4d8dxf372dxabc123");
    }

    #[test]
    fn identifier_replaces_non_alnum() {
        assert_eq!(identifier(&identity("Ab-1 /é")), "4d8dxf372dxaby1yyy");
    }

    #[test]
    fn identifier_is_stable() {
        assert_eq!(identifier(&identity("S/N 9")), identifier(&identity("S/N 9")));
    }

    #[test]
    fn discovery_topic_layout() {
        assert_eq!(
            discovery_topic("busylight_hass", "4d8dxf372dxabc"),
            "homeassistant/light/busylight_hass/4d8dxf372dxabc/config"
        );
    }
}
