//! MIDI input handling
//!
//! Raw bytes arrive on the MIDI callback thread. They are parsed with midly
//! into [`ButtonPress`] events and queued over a flume channel; the ticking
//! thread drains the queue and decides what each press means for the active
//! mode.

use crate::types::{ButtonPress, MidiAddress};
use flume::{Receiver, Sender, TrySendError};
use midly::live::LiveEvent;
use midly::MidiMessage;

/// Presses buffered between two fast ticks
const QUEUE_CAPACITY: usize = 256;

/// Parse raw MIDI bytes into a button event
///
/// Note On with velocity 0 counts as a release. A control change above 63
/// counts as a press. Everything else is ignored.
pub fn parse_press(data: &[u8]) -> Option<ButtonPress> {
    let event = LiveEvent::parse(data).ok()?;
    let LiveEvent::Midi { channel, message } = event else {
        return None;
    };
    let channel = channel.as_int();
    let (address, pressed) = match message {
        MidiMessage::NoteOn { key, vel } => {
            (MidiAddress::note(channel, key.as_int()), vel.as_int() > 0)
        }
        MidiMessage::NoteOff { key, .. } => (MidiAddress::note(channel, key.as_int()), false),
        MidiMessage::Controller { controller, value } => (
            MidiAddress::CC {
                channel,
                cc: controller.as_int(),
            },
            value.as_int() > 63,
        ),
        _ => return None,
    };
    Some(ButtonPress { address, pressed })
}

/// Sending half of the press queue, safe to move into a MIDI callback
#[derive(Clone)]
pub struct PressSender {
    tx: Sender<ButtonPress>,
}

impl PressSender {
    /// Parse and enqueue one raw MIDI message
    ///
    /// Returns whether a press was queued.
    pub fn on_midi(&self, data: &[u8]) -> bool {
        let Some(press) = parse_press(data) else {
            log::trace!("[MIDI IN] ignored {:02X?}", data);
            return false;
        };
        log::trace!("[MIDI IN] {:?}", press);
        match self.tx.try_send(press) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("MIDI input: queue full, dropping {:?}", press);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Create a bounded press queue
pub fn press_queue() -> (PressSender, Receiver<ButtonPress>) {
    let (tx, rx) = flume::bounded(QUEUE_CAPACITY);
    (PressSender { tx }, rx)
}
