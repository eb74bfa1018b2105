//! Last known light state and the messages that carry it.

use crate::command::LightCommand;
use crate::led::{Colour, Rgb};

/// Default colour: full-brightness red.
pub const DEFAULT_COLOUR: Colour = Colour::new(255, 0, 0, 255);

/// On/off plus the requested colour. The colour is kept while off so the
/// next bare `on` restores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightState {
    pub on: bool,
    pub colour: Colour,
}

impl Default for LightState {
    fn default() -> Self {
        LightState {
            on: true,
            colour: DEFAULT_COLOUR,
        }
    }
}

impl LightState {
    pub fn new(on: bool, colour: Colour) -> Self {
        LightState { on, colour }
    }

    /// Colour the device should show for this state.
    pub fn target_rgb(&self) -> Rgb {
        if self.on {
            self.colour.effective_rgb()
        } else {
            Rgb::OFF
        }
    }

    /// Apply a decoded command and return the RGB to write.
    pub fn apply(&mut self, command: &LightCommand) -> Rgb {
        match command {
            LightCommand::Off { .. } => self.on = false,
            LightCommand::On { fields, offset, .. } => {
                let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
                self.colour.update_from_fields(&fields, *offset);
                self.on = true;
            }
        }
        self.target_rgb()
    }

    /// State payload `"<on|off>,r,g,b,brightness"`.
    pub fn payload(&self) -> String {
        let switch = if self.on { "on" } else { "off" };
        format!("{switch},{}", self.colour.serialize())
    }

    pub fn to_message(&self, topic: &str) -> OutgoingMessage {
        OutgoingMessage {
            topic: topic.to_string(),
            payload: self.payload(),
        }
    }
}

/// One entry of the outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub topic: String,
    pub payload: String,
}
