//! USB/HID protocol constants for supported busylights.
//!
//! Lights are driven with HID output reports sent over the control pipe
//! (class request SET_REPORT), which every HID device must accept.

// ── Vendor / product IDs ──

/// Microchip vendor ID used by Luxafor lights.
pub const LUXAFOR_VID: u16 = 0x04d8;

/// Luxafor Flag product ID.
pub const LUXAFOR_FLAG_PID: u16 = 0xf372;

// ── HID class requests ──

/// HID class request: SET_REPORT.
pub const HID_REQUEST_SET_REPORT: u8 = 0x09;

/// HID report type for output reports (high byte of wValue).
pub const HID_REPORT_TYPE_OUTPUT: u16 = 0x02;

/// HID interface number carrying the light's output reports.
pub const HID_INTERFACE: u8 = 0;

/// Timeout for a single control transfer.
pub const USB_TIMEOUT_MS: u64 = 1000;

/// `wValue` for SET_REPORT: report type in the high byte, report ID 0.
pub const fn set_report_value(report_id: u8) -> u16 {
    (HID_REPORT_TYPE_OUTPUT << 8) | report_id as u16
}

// ── Luxafor report layout ──

/// Luxafor "static colour" command byte.
pub const LUXAFOR_CMD_STATIC: u8 = 0x01;

/// Luxafor LED selector addressing every LED at once.
pub const LUXAFOR_LED_ALL: u8 = 0xFF;

/// Luxafor output report length.
pub const LUXAFOR_REPORT_LEN: usize = 8;

/// Build a Luxafor static-colour report.
///
/// Layout: `[cmd][led][r][g][b][0][0][0]`, where `led` is 1-based or
/// [`LUXAFOR_LED_ALL`].
pub fn luxafor_static_report(led: u8, red: u8, green: u8, blue: u8) -> [u8; LUXAFOR_REPORT_LEN] {
    [LUXAFOR_CMD_STATIC, led, red, green, blue, 0, 0, 0]
}
