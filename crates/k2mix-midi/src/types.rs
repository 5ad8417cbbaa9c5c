//! Controller addresses
//!
//! The Xone K2 speaks plain MIDI on one channel: buttons send notes, knobs
//! and faders send control changes. LEDs are addressed by the note of the
//! button they sit under.

use serde::{Deserialize, Serialize};

/// Default MIDI channel of the K2 (channel 15, zero-based 14)
pub const DEFAULT_MIDI_CHANNEL: u8 = 14;

/// Note of the layer button
pub const LAYER_BUTTON: u8 = 0x0C;

/// Notes of the 16 lettered buttons, top-left `a` to bottom-right `p`
const LETTER_NOTES: [u8; 16] = [
    0x24, 0x25, 0x26, 0x27, // a b c d
    0x20, 0x21, 0x22, 0x23, // e f g h
    0x1C, 0x1D, 0x1E, 0x1F, // i j k l
    0x18, 0x19, 0x1A, 0x1B, // m n o p
];

/// Note of a lettered button (`'a'..='p'`)
pub fn letter_note(letter: char) -> Option<u8> {
    let index = (letter as u32).checked_sub('a' as u32)?;
    LETTER_NOTES.get(index as usize).copied()
}

/// MIDI address (channel + note/CC)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MidiAddress {
    /// Note On/Off message
    Note {
        /// MIDI channel (0-15)
        channel: u8,
        /// Note number (0-127)
        note: u8,
    },
    /// Control Change message
    #[serde(rename = "control_change")]
    CC {
        /// MIDI channel (0-15)
        channel: u8,
        /// CC number (0-127)
        cc: u8,
    },
}

impl MidiAddress {
    pub fn note(channel: u8, note: u8) -> Self {
        Self::Note { channel, note }
    }

    pub fn channel(&self) -> u8 {
        match self {
            Self::Note { channel, .. } | Self::CC { channel, .. } => *channel,
        }
    }
}

/// A button going down or up
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ButtonPress {
    pub address: MidiAddress,
    pub pressed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letter_notes() {
        assert_eq!(letter_note('a'), Some(0x24));
        assert_eq!(letter_note('e'), Some(0x20));
        assert_eq!(letter_note('l'), Some(0x1F));
        assert_eq!(letter_note('p'), Some(0x1B));
        assert_eq!(letter_note('q'), None);
        assert_eq!(letter_note('A'), None);
    }

    #[test]
    fn test_address_yaml() {
        let addr: MidiAddress =
            serde_yaml::from_str("type: note\nchannel: 14\nnote: 36\n").unwrap();
        assert_eq!(addr, MidiAddress::note(14, 0x24));
        let cc: MidiAddress =
            serde_yaml::from_str("type: control_change\nchannel: 14\ncc: 16\n").unwrap();
        assert_eq!(cc.channel(), 14);
    }
}
