//! Colour model and timed LED transitions.

mod color;
mod transition;

pub use color::{Colour, Rgb, parse_field_or};
pub use transition::{STARTUP_SWEEP_STEP, apply_colour, sweep};
