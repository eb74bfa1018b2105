//! Light communication: trait + Linux USB backend.

use std::fmt;

use serde::Serialize;

use crate::led::Rgb;

// ── Error type ──

/// Light communication errors.
///
/// String payloads follow the convention **"context: details"** where *context*
/// identifies the operation (e.g. `"USB open"`, `"SET_REPORT"`) and *details*
/// describes what went wrong.
#[derive(Debug)]
pub enum DeviceError {
    /// Nothing is attached at the given path.
    NotFound(String),
    /// The path is not in `usb:BBB/DDD` form.
    InvalidPath(String),
    OpenFailed(String),
    WriteFailed(String),
    UnsupportedDevice(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::NotFound(path) => write!(f, "No light found at path {path}"),
            DeviceError::InvalidPath(path) => {
                write!(f, "Invalid light path: {path} (expected usb:BUS/ADDRESS)")
            }
            DeviceError::OpenFailed(e) => write!(f, "Failed to open light: {e}"),
            DeviceError::WriteFailed(e) => write!(f, "Light write failed: {e}"),
            DeviceError::UnsupportedDevice(id) => write!(f, "Unsupported light: {id}"),
        }
    }
}

impl std::error::Error for DeviceError {}

pub type Result<T> = std::result::Result<T, DeviceError>;

// ── Identity ──

/// USB identity of the attached light, read once when it is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: String,
    pub manufacturer: String,
    pub product: String,
    /// `bcdDevice` from the device descriptor.
    pub release_number: u16,
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{:04x}:{:04x}] serial {}",
            self.product, self.vendor_id, self.product_id, self.serial_number
        )
    }
}

// ── Paths ──

/// Parse a light path of the form `usb:BBB/DDD` into `(bus, address)`.
pub fn parse_usb_path(path: &str) -> Option<(u8, u8)> {
    let rest = path.trim().strip_prefix("usb:")?;
    let (bus, address) = rest.split_once('/')?;
    Some((bus.parse().ok()?, address.parse().ok()?))
}

/// Format a bus/address pair as a light path.
pub fn format_usb_path(bus: u8, address: u8) -> String {
    format!("usb:{bus:03}/{address:03}")
}

// ── Trait ──

pub trait BusyLight {
    /// Path the light was opened at.
    fn path(&self) -> &str;
    fn identity(&self) -> &DeviceIdentity;
    /// Number of individually addressable LEDs.
    fn led_count(&self) -> usize;
    /// Set the whole light (`led == None`) or one 1-based LED to `rgb`.
    fn set_color(&self, rgb: Rgb, led: Option<usize>) -> Result<()>;
    /// Last colour written to the light.
    fn color(&self) -> Rgb;

    fn is_lit(&self) -> bool {
        !self.color().is_off()
    }

    fn off(&self) -> Result<()> {
        self.set_color(Rgb::OFF, None)
    }
}

// ── Linux implementation ──

#[cfg(target_os = "linux")]
mod linux_impl {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    use nusb::transfer::Control;
    use nusb::transfer::ControlType;
    use nusb::transfer::Recipient;

    use crate::models::{self, LightProfile};
    use crate::protocol::{
        HID_INTERFACE, HID_REQUEST_SET_REPORT, LUXAFOR_LED_ALL, USB_TIMEOUT_MS,
        luxafor_static_report, set_report_value,
    };

    pub struct UsbLight {
        interface: nusb::Interface,
        identity: DeviceIdentity,
        profile: &'static LightProfile,
        path: String,
        color: Cell<Rgb>,
    }

    impl UsbLight {
        /// Open the supported light attached at `path` (`usb:BBB/DDD`).
        pub fn open_at(path: &str) -> Result<Self> {
            let (bus, address) =
                parse_usb_path(path).ok_or_else(|| DeviceError::InvalidPath(path.to_string()))?;

            let device_info = nusb::list_devices()
                .map_err(|e| DeviceError::OpenFailed(format!("USB enumeration: {e}")))?
                .find(|dev| dev.bus_number() == bus && dev.device_address() == address)
                .ok_or_else(|| DeviceError::NotFound(path.to_string()))?;

            let profile = models::detect_light(device_info.vendor_id(), device_info.product_id())
                .ok_or_else(|| {
                    DeviceError::UnsupportedDevice(format!(
                        "{:04x}:{:04x} at {path}",
                        device_info.vendor_id(),
                        device_info.product_id()
                    ))
                })?;

            let identity = DeviceIdentity {
                vendor_id: device_info.vendor_id(),
                product_id: device_info.product_id(),
                serial_number: device_info.serial_number().unwrap_or_default().to_string(),
                manufacturer: device_info
                    .manufacturer_string()
                    .unwrap_or_default()
                    .to_string(),
                product: device_info
                    .product_string()
                    .unwrap_or(profile.name)
                    .to_string(),
                release_number: device_info.device_version(),
            };

            let usb_device = device_info
                .open()
                .map_err(|e| DeviceError::OpenFailed(format!("USB open: {e}")))?;

            // The kernel HID driver owns the interface until we detach it.
            let interface = usb_device
                .detach_and_claim_interface(HID_INTERFACE)
                .map_err(|e| {
                    DeviceError::OpenFailed(format!("claim interface {HID_INTERFACE}: {e}"))
                })?;

            Ok(UsbLight {
                interface,
                identity,
                profile,
                path: format_usb_path(bus, address),
                color: Cell::new(Rgb::OFF),
            })
        }

        fn send_report(&self, report: &[u8]) -> Result<()> {
            let control = Control {
                control_type: ControlType::Class,
                recipient: Recipient::Interface,
                request: HID_REQUEST_SET_REPORT,
                value: set_report_value(0),
                index: u16::from(HID_INTERFACE),
            };
            self.interface
                .control_out_blocking(control, report, Duration::from_millis(USB_TIMEOUT_MS))
                .map_err(|e| DeviceError::WriteFailed(format!("SET_REPORT: {e}")))?;
            Ok(())
        }
    }

    impl BusyLight for UsbLight {
        fn path(&self) -> &str {
            &self.path
        }

        fn identity(&self) -> &DeviceIdentity {
            &self.identity
        }

        fn led_count(&self) -> usize {
            self.profile.led_count
        }

        fn set_color(&self, rgb: Rgb, led: Option<usize>) -> Result<()> {
            let selector = match led {
                None => LUXAFOR_LED_ALL,
                Some(i) if (1..=self.profile.led_count).contains(&i) => i as u8,
                Some(i) => {
                    return Err(DeviceError::WriteFailed(format!(
                        "LED {i}: out of range 1..={}",
                        self.profile.led_count
                    )));
                }
            };
            self.send_report(&luxafor_static_report(
                selector, rgb.red, rgb.green, rgb.blue,
            ))?;
            self.color.set(rgb);
            Ok(())
        }

        fn color(&self) -> Rgb {
            self.color.get()
        }
    }
}

#[cfg(target_os = "linux")]
pub use linux_impl::UsbLight;

// ── Stub light for unsupported platforms ──

/// Placeholder light that is never found.
/// Enables compilation and `cargo test` on unsupported hosts.
#[cfg(not(target_os = "linux"))]
pub struct StubLight {
    identity: DeviceIdentity,
}

#[cfg(not(target_os = "linux"))]
impl StubLight {
    pub fn open_at(path: &str) -> Result<Self> {
        Err(DeviceError::NotFound(path.to_string()))
    }
}

#[cfg(not(target_os = "linux"))]
impl BusyLight for StubLight {
    fn path(&self) -> &str {
        ""
    }
    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }
    fn led_count(&self) -> usize {
        0
    }
    fn set_color(&self, _rgb: Rgb, _led: Option<usize>) -> Result<()> {
        Err(DeviceError::WriteFailed("no USB backend on this platform".into()))
    }
    fn color(&self) -> Rgb {
        Rgb::OFF
    }
}

// ── Enumeration ──

/// A supported light seen on the bus (not opened).
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredLight {
    /// Path accepted by [`open_light`], e.g. `usb:001/004`.
    pub path: String,
    pub name: String,
    pub serial: Option<String>,
    pub led_count: usize,
}

/// Enumerate attached lights that have a known profile.
///
/// On unsupported platforms, always returns an empty list.
pub fn enumerate_lights() -> Vec<DiscoveredLight> {
    #[cfg(target_os = "linux")]
    {
        enumerate_lights_linux()
    }
    #[cfg(not(target_os = "linux"))]
    {
        Vec::new()
    }
}

#[cfg(target_os = "linux")]
fn enumerate_lights_linux() -> Vec<DiscoveredLight> {
    let Ok(devices) = nusb::list_devices() else {
        return Vec::new();
    };

    devices
        .filter_map(|dev| {
            let profile = crate::models::detect_light(dev.vendor_id(), dev.product_id())?;
            Some(DiscoveredLight {
                path: format_usb_path(dev.bus_number(), dev.device_address()),
                name: profile.name.to_string(),
                serial: dev.serial_number().map(|s| s.to_string()),
                led_count: profile.led_count,
            })
        })
        .collect()
}

/// Concrete light type for the current platform.
#[cfg(target_os = "linux")]
pub type PlatformLight = UsbLight;
#[cfg(not(target_os = "linux"))]
pub type PlatformLight = StubLight;

/// Open the light attached at `path`.
pub fn open_light(path: &str) -> Result<PlatformLight> {
    PlatformLight::open_at(path)
}

// ── Mock light for testing ──

/// In-memory mock light for unit and integration tests.
///
/// Always compiled (zero runtime cost), hidden from public docs.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// One recorded `set_color` call.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct ColourWrite {
        pub rgb: Rgb,
        pub led: Option<usize>,
        /// Runtime clock at the time of the write (follows a paused clock).
        pub at: tokio::time::Instant,
    }

    /// In-memory light. Records every colour write; `fail_writes` injects
    /// write errors.
    pub struct MockLight {
        identity: DeviceIdentity,
        path: String,
        led_count: usize,
        color: Cell<Rgb>,
        /// Recorded writes, oldest first.
        pub writes: RefCell<Vec<ColourWrite>>,
        /// If true, `set_color` returns an error.
        pub fail_writes: Cell<bool>,
    }

    impl Default for MockLight {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockLight {
        pub fn new() -> Self {
            Self::with_leds(6)
        }

        pub fn with_leds(led_count: usize) -> Self {
            MockLight {
                identity: DeviceIdentity {
                    vendor_id: 0x04d8,
                    product_id: 0xf372,
                    serial_number: "MOCK123".into(),
                    manufacturer: "Mock Lights".into(),
                    product: "Mock Flag".into(),
                    release_number: 0x0100,
                },
                path: "usb:001/004".into(),
                led_count,
                color: Cell::new(Rgb::OFF),
                writes: RefCell::new(Vec::new()),
                fail_writes: Cell::new(false),
            }
        }

        /// Mutable access to the identity (for tests that need other serials).
        pub fn identity_mut(&mut self) -> &mut DeviceIdentity {
            &mut self.identity
        }

        pub fn write_count(&self) -> usize {
            self.writes.borrow().len()
        }

        pub fn last_write(&self) -> Option<ColourWrite> {
            self.writes.borrow().last().copied()
        }
    }

    impl BusyLight for MockLight {
        fn path(&self) -> &str {
            &self.path
        }

        fn identity(&self) -> &DeviceIdentity {
            &self.identity
        }

        fn led_count(&self) -> usize {
            self.led_count
        }

        fn set_color(&self, rgb: Rgb, led: Option<usize>) -> Result<()> {
            if self.fail_writes.get() {
                return Err(DeviceError::WriteFailed(
                    "mock: write failure injected".into(),
                ));
            }
            self.writes.borrow_mut().push(ColourWrite {
                rgb,
                led,
                at: tokio::time::Instant::now(),
            });
            self.color.set(rgb);
            Ok(())
        }

        fn color(&self) -> Rgb {
            self.color.get()
        }
    }
}
