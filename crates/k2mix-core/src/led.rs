//! Indicator colours the core asks for
//!
//! The Xone K series buttons carry three fixed LED layers; the core only
//! picks one of them (or none). Encoding to MIDI lives in `k2mix-midi`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedColor {
    #[default]
    Off,
    Red,
    Amber,
    Green,
}

impl LedColor {
    pub fn is_on(&self) -> bool {
        *self != Self::Off
    }

    /// `color` while `on`, dark otherwise
    pub fn when(on: bool, color: LedColor) -> Self {
        if on {
            color
        } else {
            Self::Off
        }
    }
}
