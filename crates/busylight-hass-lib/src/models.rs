//! Light profiles: LED counts for supported busylights.
//!
//! Each profile maps a USB vendor/product pair to a display name and the
//! number of individually addressable LEDs. Unknown lights get `None` from
//! [`detect_light`] and are not opened.

use crate::protocol::{LUXAFOR_FLAG_PID, LUXAFOR_VID};

/// Profile for a supported light model.
#[derive(Debug, PartialEq, Eq)]
pub struct LightProfile {
    pub name: &'static str,
    pub vendor_id: u16,
    pub product_id: u16,
    /// Individually addressable LEDs, numbered `1..=led_count`.
    pub led_count: usize,
}

/// Luxafor Flag: three LEDs on each side of the tab.
pub const LUXAFOR_FLAG: LightProfile = LightProfile {
    name: "Luxafor Flag",
    vendor_id: LUXAFOR_VID,
    product_id: LUXAFOR_FLAG_PID,
    led_count: 6,
};

/// All known light profiles.
pub static ALL_LIGHTS: &[&LightProfile] = &[&LUXAFOR_FLAG];

/// Look up the profile for a vendor/product pair.
pub fn detect_light(vendor_id: u16, product_id: u16) -> Option<&'static LightProfile> {
    ALL_LIGHTS
        .iter()
        .find(|p| p.vendor_id == vendor_id && p.product_id == product_id)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_luxafor_flag() {
        let p = detect_light(0x04d8, 0xf372).unwrap();
        assert_eq!(p.name, "Luxafor Flag");
        assert_eq!(p.led_count, 6);
    }

    #[test]
    fn unknown_product_is_none() {
        assert!(detect_light(0x04d8, 0x0001).is_none());
    }

    #[test]
    fn unknown_vendor_is_none() {
        assert!(detect_light(0x1234, 0xf372).is_none());
    }

    #[test]
    fn all_profiles_have_leds() {
        for p in ALL_LIGHTS {
            assert!(p.led_count > 0, "{} has no LEDs", p.name);
        }
    }
}
