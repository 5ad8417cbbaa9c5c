//! LED feedback
//!
//! The K2 has fixed red/amber/green LEDs per button. MIDI selects a colour by
//! adding a note offset to the button's note (+0 red, +36 amber, +72 green)
//! and switches it with Note On/Off. Each colour is a different note, so the
//! old colour note must be turned off before a new one is turned on.

use crate::types::MidiAddress;
use midly::live::LiveEvent;
use midly::num::{u4, u7};
use midly::MidiMessage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use k2mix_core::LedColor;

/// Destination for LED colour changes
pub trait LedSink {
    fn set_led(&mut self, address: MidiAddress, color: LedColor);
}

/// Note offsets selecting each LED colour layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorNoteOffsets {
    pub red: u8,
    pub amber: u8,
    pub green: u8,
}

impl Default for ColorNoteOffsets {
    fn default() -> Self {
        Self {
            red: 0,
            amber: 36,
            green: 72,
        }
    }
}

impl ColorNoteOffsets {
    /// Offset for `color`, `None` for off
    pub fn offset(&self, color: LedColor) -> Option<u8> {
        match color {
            LedColor::Off => None,
            LedColor::Red => Some(self.red),
            LedColor::Amber => Some(self.amber),
            LedColor::Green => Some(self.green),
        }
    }
}

/// Remembers last-sent colours to avoid redundant sends
#[derive(Debug, Default)]
pub struct LedChangeTracker {
    last: HashMap<MidiAddress, LedColor>,
}

impl LedChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `color`, returning the previous colour if it changed
    ///
    /// An address never seen before counts as changed from off, the device
    /// state is unknown until the first write.
    pub fn update(&mut self, address: MidiAddress, color: LedColor) -> Option<LedColor> {
        match self.last.insert(address, color) {
            Some(previous) if previous == color => None,
            Some(previous) => Some(previous),
            None => Some(LedColor::Off),
        }
    }

    pub fn clear(&mut self) {
        self.last.clear();
    }

    /// Addresses currently lit
    pub fn lit(&self) -> impl Iterator<Item = (&MidiAddress, &LedColor)> {
        self.last.iter().filter(|(_, color)| color.is_on())
    }
}

/// Encode one note or CC message as raw MIDI bytes
fn encode(address: MidiAddress, offset: u8, on: bool) -> Option<Vec<u8>> {
    let (channel, message) = match address {
        MidiAddress::Note { channel, note } => {
            let key = u7::new(note.wrapping_add(offset) & 0x7F);
            let message = if on {
                MidiMessage::NoteOn {
                    key,
                    vel: u7::new(127),
                }
            } else {
                MidiMessage::NoteOff {
                    key,
                    vel: u7::new(0),
                }
            };
            (channel, message)
        }
        MidiAddress::CC { channel, cc } => (
            channel,
            MidiMessage::Controller {
                controller: u7::new(cc & 0x7F),
                value: u7::new(if on { 127 } else { 0 }),
            },
        ),
    };
    let event = LiveEvent::Midi {
        channel: u4::new(channel & 0x0F),
        message,
    };
    let mut bytes = Vec::with_capacity(3);
    match event.write_std(&mut bytes) {
        Ok(()) => Some(bytes),
        Err(e) => {
            log::warn!("LED output: failed to encode {:?}: {}", address, e);
            None
        }
    }
}

/// Messages switching `address` from `previous` to `color`
pub fn transition_messages(
    offsets: &ColorNoteOffsets,
    address: MidiAddress,
    previous: LedColor,
    color: LedColor,
) -> Vec<Vec<u8>> {
    if matches!(address, MidiAddress::CC { .. }) {
        return encode(address, 0, color.is_on()).into_iter().collect();
    }
    let mut messages = Vec::with_capacity(2);
    match offsets.offset(previous) {
        Some(old) => messages.extend(encode(address, old, false)),
        // Unknown or dark: clear the base note
        None if !color.is_on() => messages.extend(encode(address, 0, false)),
        None => {}
    }
    if let Some(new) = offsets.offset(color) {
        messages.extend(encode(address, new, true));
    }
    messages
}

/// [`LedSink`] writing raw MIDI through a send function
///
/// `send` is typically a MIDI output connection's `send`.
pub struct MidiLedSink<F: FnMut(&[u8])> {
    send: F,
    offsets: ColorNoteOffsets,
    tracker: LedChangeTracker,
}

impl<F: FnMut(&[u8])> MidiLedSink<F> {
    pub fn new(offsets: ColorNoteOffsets, send: F) -> Self {
        Self {
            send,
            offsets,
            tracker: LedChangeTracker::new(),
        }
    }

    /// Turn every lit LED off
    pub fn clear_all(&mut self) {
        let lit: Vec<(MidiAddress, LedColor)> = self.tracker.lit().map(|(a, c)| (*a, *c)).collect();
        for (address, color) in lit {
            for message in transition_messages(&self.offsets, address, color, LedColor::Off) {
                (self.send)(&message);
            }
        }
        self.tracker.clear();
    }
}

impl<F: FnMut(&[u8])> LedSink for MidiLedSink<F> {
    fn set_led(&mut self, address: MidiAddress, color: LedColor) {
        let Some(previous) = self.tracker.update(address, color) else {
            return;
        };
        log::trace!("[LED] {:?}: {:?} -> {:?}", address, previous, color);
        for message in transition_messages(&self.offsets, address, previous, color) {
            (self.send)(&message);
        }
    }
}
