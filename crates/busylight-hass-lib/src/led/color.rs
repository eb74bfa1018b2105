//! Colour model: RGB plus brightness, and its wire form.
//!
//! The wire form is `"r,g,b,brightness"`, the tail of the state payload
//! `"<on|off>,r,g,b,brightness"` that the hub splits on commas.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// An RGB triple as written to the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    /// All channels dark.
    pub const OFF: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Rgb { red, green, blue }
    }

    pub fn is_off(&self) -> bool {
        *self == Rgb::OFF
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.red, self.green, self.blue)
    }
}

/// Parse `fields[position]`, falling back to `current` when the token is
/// missing or does not parse.
pub fn parse_field_or<T: FromStr>(current: T, fields: &[&str], position: usize) -> T {
    fields
        .get(position)
        .and_then(|token| token.trim().parse().ok())
        .unwrap_or(current)
}

/// Requested colour: raw channels plus a brightness that scales them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Colour {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub brightness: u8,
}

impl Colour {
    pub const fn new(red: u8, green: u8, blue: u8, brightness: u8) -> Self {
        Colour {
            red,
            green,
            blue,
            brightness,
        }
    }

    /// Channels scaled by brightness: `floor(channel * brightness / 255)`.
    ///
    /// Full brightness returns the raw channels, zero brightness is dark.
    pub fn effective_rgb(&self) -> Rgb {
        match self.brightness {
            255 => Rgb::new(self.red, self.green, self.blue),
            0 => Rgb::OFF,
            b => {
                let scale = |c: u8| (u16::from(c) * u16::from(b) / 255) as u8;
                Rgb::new(scale(self.red), scale(self.green), scale(self.blue))
            }
        }
    }

    /// Apply red, green, blue, brightness from `fields[offset..offset + 4]`.
    ///
    /// Missing, empty and unparseable tokens (including values outside
    /// 0–255) keep the current value.
    pub fn update_from_fields(&mut self, fields: &[&str], offset: usize) {
        self.red = parse_field_or(self.red, fields, offset);
        self.green = parse_field_or(self.green, fields, offset + 1);
        self.blue = parse_field_or(self.blue, fields, offset + 2);
        self.brightness = parse_field_or(self.brightness, fields, offset + 3);
    }

    /// Wire form `"r,g,b,brightness"`.
    pub fn serialize(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.red, self.green, self.blue, self.brightness
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── effective_rgb ──

    #[test]
    fn full_brightness_is_raw() {
        for c in 0..=255u8 {
            let colour = Colour::new(c, c, c, 255);
            assert_eq!(colour.effective_rgb(), Rgb::new(c, c, c));
        }
    }

    #[test]
    fn zero_brightness_is_dark() {
        for c in 0..=255u8 {
            let colour = Colour::new(c, 255 - c, c / 2, 0);
            assert_eq!(colour.effective_rgb(), Rgb::OFF);
        }
    }

    #[test]
    fn scaling_is_monotonic_in_brightness() {
        for c in 0..=255u8 {
            let mut previous = 0u8;
            for b in 0..=255u8 {
                let scaled = Colour::new(c, 0, 0, b).effective_rgb().red;
                assert!(scaled >= previous, "c={c} b={b}: {scaled} < {previous}");
                assert!(scaled <= c);
                previous = scaled;
            }
        }
    }

    #[test]
    fn half_brightness_floors() {
        // 255 * 128 / 255 = 128, 100 * 128 / 255 = 50.19 -> 50
        let colour = Colour::new(255, 100, 1, 128);
        assert_eq!(colour.effective_rgb(), Rgb::new(128, 50, 0));
    }

    // ── update_from_fields ──

    #[test]
    fn update_applies_all_four() {
        let mut colour = Colour::new(255, 0, 0, 255);
        colour.update_from_fields(&["on", "10", "20", "30", "200"], 1);
        assert_eq!(colour, Colour::new(10, 20, 30, 200));
    }

    #[test]
    fn update_short_list_keeps_tail() {
        let mut colour = Colour::new(1, 2, 3, 4);
        colour.update_from_fields(&["on", "9"], 1);
        assert_eq!(colour, Colour::new(9, 2, 3, 4));
    }

    #[test]
    fn update_empty_tokens_keep_values() {
        let mut colour = Colour::new(1, 2, 3, 4);
        colour.update_from_fields(&["on", "", "", "", "", ""], 1);
        assert_eq!(colour, Colour::new(1, 2, 3, 4));
    }

    #[test]
    fn update_bad_tokens_keep_values() {
        let mut colour = Colour::new(1, 2, 3, 4);
        colour.update_from_fields(&["on", "red", "7", "2.5", "-1"], 1);
        assert_eq!(colour, Colour::new(1, 7, 3, 4));
    }

    #[test]
    fn update_out_of_range_keeps_value() {
        let mut colour = Colour::new(1, 2, 3, 4);
        colour.update_from_fields(&["256", "1000", "255", "0"], 0);
        assert_eq!(colour, Colour::new(1, 2, 255, 0));
    }

    #[test]
    fn update_trims_whitespace() {
        let mut colour = Colour::new(0, 0, 0, 0);
        colour.update_from_fields(&[" 5", "6 ", " 7 ", "8"], 0);
        assert_eq!(colour, Colour::new(5, 6, 7, 8));
    }

    #[test]
    fn update_offset_past_end_is_noop() {
        let mut colour = Colour::new(1, 2, 3, 4);
        colour.update_from_fields(&["on"], 5);
        assert_eq!(colour, Colour::new(1, 2, 3, 4));
    }

    // ── serialize ──

    #[test]
    fn serialize_format() {
        assert_eq!(Colour::new(255, 0, 16, 128).serialize(), "255,0,16,128");
    }

    #[test]
    fn serialized_fields_split_back() {
        let colour = Colour::new(12, 34, 56, 78);
        let text = colour.serialize();
        let fields: Vec<&str> = text.split(',').collect();
        let mut parsed = Colour::new(0, 0, 0, 0);
        parsed.update_from_fields(&fields, 0);
        assert_eq!(parsed, colour);
    }

    #[test]
    fn rgb_off_is_off() {
        assert!(Rgb::OFF.is_off());
        assert!(!Rgb::new(0, 0, 1).is_off());
    }
}
