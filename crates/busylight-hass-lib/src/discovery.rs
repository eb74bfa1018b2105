//! Home Assistant MQTT discovery document.
//!
//! Published once (retained, QoS 2) so the hub creates a template-schema
//! `light` entity bound to the per-light topics.

use serde::Serialize;

use crate::device::DeviceIdentity;
use crate::topic::{self, TopicSet};

/// Command template for "on": colour fields then transition, comma-separated.
pub const COMMAND_ON_TEMPLATE: &str = "on,{{ red | d }},{{ green | d }},{{ blue | d }},{{ brightness | d }},{{ transition | d }}";
pub const COMMAND_OFF_TEMPLATE: &str = "off,{{ transition | d }}";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub sw_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OriginInfo {
    pub name: &'static str,
    pub sw_version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub url: &'static str,
}

/// Discovery descriptor. Field order is the serialized order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryDescriptor {
    pub device: DeviceInfo,
    pub origin: OriginInfo,
    pub unique_id: String,
    pub object_id: String,
    pub schema: &'static str,
    pub availability_topic: String,
    pub state_topic: String,
    pub command_topic: String,
    pub command_on_template: &'static str,
    pub command_off_template: &'static str,
    pub state_template: &'static str,
    pub brightness_template: &'static str,
    pub red_template: &'static str,
    pub green_template: &'static str,
    pub blue_template: &'static str,
    pub qos: u8,
    #[serde(skip)]
    pub topic: String,
}

impl DiscoveryDescriptor {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

pub fn build_discovery(identity: &DeviceIdentity, tag: &str) -> DiscoveryDescriptor {
    let id = topic::identifier(identity);
    let topics = TopicSet::new(identity, tag);

    DiscoveryDescriptor {
        device: DeviceInfo {
            identifiers: vec![id.clone()],
            name: format!("{} {}", identity.product, identity.serial_number),
            manufacturer: identity.manufacturer.clone(),
            model: identity.product.clone(),
            serial_number: identity.serial_number.clone(),
            sw_version: format!("{:#x}", identity.release_number),
        },
        origin: OriginInfo {
            name: "busylight-hass",
            sw_version: env!("CARGO_PKG_VERSION"),
            url: env!("CARGO_PKG_REPOSITORY"),
        },
        unique_id: id.clone(),
        object_id: id.clone(),
        schema: "template",
        availability_topic: topics.availability,
        state_topic: topics.state,
        command_topic: topics.command,
        command_on_template: COMMAND_ON_TEMPLATE,
        command_off_template: COMMAND_OFF_TEMPLATE,
        // Must render `on` or `off`.
        state_template: "{{ value.split(',')[0] }}",
        red_template: "{{ value.split(',')[1] }}",
        green_template: "{{ value.split(',')[2] }}",
        blue_template: "{{ value.split(',')[3] }}",
        brightness_template: "{{ value.split(',')[4] }}",
        qos: 2,
        topic: topic::discovery_topic(tag, &id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::BusyLight;
    use crate::device::mock::MockLight;

    fn descriptor() -> DiscoveryDescriptor {
        let dev = MockLight::new();
        build_discovery(dev.identity(), "busylight_hass")
    }

    #[test]
    fn byte_identical_for_same_identity() {
        let a = descriptor().to_json().unwrap();
        let b = descriptor().to_json().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn topics_match_topic_set() {
        let dev = MockLight::new();
        let d = build_discovery(dev.identity(), "busylight_hass");
        let topics = TopicSet::new(dev.identity(), "busylight_hass");
        assert_eq!(d.state_topic, topics.state);
        assert_eq!(d.command_topic, topics.command);
        assert_eq!(d.availability_topic, topics.availability);
        assert_eq!(
            d.topic,
            "homeassistant/light/busylight_hass/4d8dxf372dxmock123/config"
        );
    }

    #[test]
    fn json_fields() {
        let json: serde_json::Value =
            serde_json::from_str(&descriptor().to_json().unwrap()).unwrap();
        assert_eq!(json["schema"], "template");
        assert_eq!(json["qos"], 2);
        assert_eq!(json["unique_id"], "4d8dxf372dxmock123");
        assert_eq!(json["device"]["identifiers"][0], "4d8dxf372dxmock123");
        assert_eq!(json["device"]["name"], "Mock Flag MOCK123");
        assert_eq!(json["device"]["sw_version"], "0x100");
        assert_eq!(json["origin"]["name"], "busylight-hass");
        assert_eq!(json["command_off_template"], "off,{{ transition | d }}");
        assert_eq!(json["brightness_template"], "{{ value.split(',')[4] }}");
        assert!(json.get("topic").is_none());
    }

    #[test]
    fn state_templates_index_state_payload() {
        let d = descriptor();
        let templates = [
            (d.state_template, 0),
            (d.red_template, 1),
            (d.green_template, 2),
            (d.blue_template, 3),
            (d.brightness_template, 4),
        ];
        for (template, index) in templates {
            assert!(template.contains(&format!("[{index}]")), "{template}");
        }
    }
}
