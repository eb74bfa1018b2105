//! Command payload decoding.
//!
//! Payloads come from the hub's command templates:
//!
//! - `off[,transition]`
//! - `on[,red,green,blue,brightness[,transition]]`
//!
//! The template filter `| d` renders unset fields as empty strings, so every
//! field after the action is optional.

use std::fmt;
use std::time::Duration;

use log::info;

/// Position of the transition token in an `off` payload.
const OFF_TRANSITION_FIELD: usize = 1;
/// Position of the first colour token in an `on` payload.
const ON_COLOUR_FIELD: usize = 1;
/// Position of the transition token in an `on` payload.
const ON_TRANSITION_FIELD: usize = 5;

/// A decoded command.
#[derive(Debug, Clone, PartialEq)]
pub enum LightCommand {
    Off {
        transition: Option<Duration>,
    },
    /// `fields` are the lower-cased payload tokens, applied to the current
    /// colour with [`crate::led::Colour::update_from_fields`] at `offset`.
    On {
        fields: Vec<String>,
        offset: usize,
        transition: Option<Duration>,
    },
}

impl LightCommand {
    pub fn transition(&self) -> Option<Duration> {
        match self {
            LightCommand::Off { transition } | LightCommand::On { transition, .. } => *transition,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    Empty,
    UnknownAction(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Empty => write!(f, "empty command"),
            DecodeError::UnknownAction(action) => write!(f, "unknown action '{action}'"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decode a command payload. The payload is lower-cased first.
pub fn decode(payload: &str) -> Result<LightCommand, DecodeError> {
    let payload = payload.to_lowercase();
    if payload.trim().is_empty() {
        return Err(DecodeError::Empty);
    }
    let fields: Vec<&str> = payload.split(',').collect();

    match fields[0].trim() {
        "off" => Ok(LightCommand::Off {
            transition: parse_transition(&fields, OFF_TRANSITION_FIELD),
        }),
        "on" => Ok(LightCommand::On {
            transition: parse_transition(&fields, ON_TRANSITION_FIELD),
            fields: fields.iter().map(|s| s.to_string()).collect(),
            offset: ON_COLOUR_FIELD,
        }),
        other => Err(DecodeError::UnknownAction(other.to_string())),
    }
}

/// Transition in seconds at `fields[position]`.
///
/// A missing or empty token means no transition. A token that is not a
/// finite, non-negative number is logged and also means no transition.
pub fn parse_transition(fields: &[&str], position: usize) -> Option<Duration> {
    let token = fields.get(position)?.trim();
    if token.is_empty() {
        return None;
    }
    match token.parse::<f64>().map(Duration::try_from_secs_f64) {
        Ok(Ok(duration)) => Some(duration),
        _ => {
            info!("bad transition from client: {fields:?}");
            None
        }
    }
}
