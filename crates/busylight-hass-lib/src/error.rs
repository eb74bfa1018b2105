//! Unified error type for the busylight-hass-lib crate.
//!
//! [`BridgeError`] wraps module-specific errors (`DeviceError`, `SessionError`)
//! and the plain configuration error kind. `From` impls let `?` propagate
//! across module boundaries.

use std::fmt;

use crate::device::DeviceError;
use crate::session::SessionError;

/// Unified error type for busylight-hass-lib operations.
#[derive(Debug)]
pub enum BridgeError {
    /// Light communication error (open, enumerate, write).
    Device(DeviceError),
    /// Broker session error (connect, subscribe, publish, connection loss).
    Session(SessionError),
    /// Standard I/O error (config file, password file).
    Io(std::io::Error),
    /// Configuration validation error.
    Config(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::Device(e) => write!(f, "{e}"),
            BridgeError::Session(e) => write!(f, "{e}"),
            BridgeError::Io(e) => write!(f, "I/O error: {e}"),
            BridgeError::Config(e) => write!(f, "Config error: {e}"),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BridgeError::Device(e) => Some(e),
            BridgeError::Session(e) => Some(e),
            BridgeError::Io(e) => Some(e),
            BridgeError::Config(_) => None,
        }
    }
}

impl From<DeviceError> for BridgeError {
    fn from(e: DeviceError) -> Self {
        BridgeError::Device(e)
    }
}

impl From<SessionError> for BridgeError {
    fn from(e: SessionError) -> Self {
        BridgeError::Session(e)
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        BridgeError::Io(e)
    }
}

/// Crate-level Result alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_device_error() {
        let e: BridgeError = DeviceError::NotFound("usb:001/002".into()).into();
        assert!(matches!(e, BridgeError::Device(DeviceError::NotFound(_))));
    }

    #[test]
    fn from_session_error() {
        let e: BridgeError = SessionError::ConnectionLost("reset".into()).into();
        assert!(matches!(
            e,
            BridgeError::Session(SessionError::ConnectionLost(_))
        ));
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let e: BridgeError = io_err.into();
        assert!(matches!(e, BridgeError::Io(_)));
    }

    #[test]
    fn display_device_error() {
        let e = BridgeError::Device(DeviceError::NotFound("usb:001/002".into()));
        assert_eq!(e.to_string(), "No light found at path usb:001/002");
    }

    #[test]
    fn display_config_error() {
        let e = BridgeError::Config("invalid input".into());
        assert_eq!(e.to_string(), "Config error: invalid input");
    }

    #[test]
    fn source_chains_session_error() {
        let e = BridgeError::Session(SessionError::Publish("queue full".into()));
        let source = std::error::Error::source(&e).unwrap();
        assert!(source.to_string().contains("queue full"));
    }

    #[test]
    fn source_none_for_config() {
        let e = BridgeError::Config("test".into());
        assert!(std::error::Error::source(&e).is_none());
    }

    #[test]
    fn question_mark_propagation_device_to_bridge() {
        fn inner() -> crate::device::Result<()> {
            Err(DeviceError::NotFound("usb:009/009".into()))
        }
        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }
        let err = outer().unwrap_err();
        assert!(matches!(err, BridgeError::Device(DeviceError::NotFound(_))));
    }
}
