//! Mode-scoped control bindings
//!
//! A mode (the K2 "layer") owns a set of LED bindings. Activating a mode
//! subscribes each binding on the engine; the engine replays the current
//! value right away, so the LEDs repaint without a separate refresh.
//! Deactivating drops every subscription and darkens the mode's LEDs.
//!
//! Subscription handlers only queue [`LedUpdate`]s on a flume channel; the
//! session flushes them to the LED sink after each tick.

use crate::led::LedColor;
use crate::types::MidiAddress;
use flume::Sender;
use k2mix_core::{ControlEngine, ControlKey, Group, SubscriptionToken};
use serde::{Deserialize, Serialize};

/// Show a control value on a button LED
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedBinding {
    pub group: Group,
    pub key: ControlKey,
    /// Button note the LED sits under
    pub note: u8,
    /// Colour while the control is non-zero
    pub on: LedColor,
    /// Colour while the control is zero
    #[serde(default)]
    pub off: LedColor,
}

impl LedBinding {
    pub fn color_for(&self, value: f64) -> LedColor {
        if value != 0.0 {
            self.on
        } else {
            self.off
        }
    }
}

/// Pending LED change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedUpdate {
    pub address: MidiAddress,
    pub color: LedColor,
}

pub struct ModeBindings {
    name: String,
    midi_channel: u8,
    leds: Vec<LedBinding>,
    tokens: Vec<SubscriptionToken>,
}

impl ModeBindings {
    pub fn new(name: impl Into<String>, midi_channel: u8, leds: Vec<LedBinding>) -> Self {
        Self {
            name: name.into(),
            midi_channel,
            leds,
            tokens: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        !self.tokens.is_empty()
    }

    /// Subscribe every binding, replaying current values into `updates`
    pub fn activate(&mut self, engine: &dyn ControlEngine, updates: &Sender<LedUpdate>) {
        if self.is_active() {
            log::debug!("Mode '{}' already active", self.name);
            return;
        }
        log::debug!("Mode '{}': activating {} bindings", self.name, self.leds.len());
        for binding in &self.leds {
            let tx = updates.clone();
            let address = MidiAddress::note(self.midi_channel, binding.note);
            let binding_colors = binding.clone();
            let token = engine.subscribe(
                binding.group,
                binding.key,
                Box::new(move |value| {
                    let color = binding_colors.color_for(value);
                    // Receiver gone means the session is shutting down
                    let _ = tx.send(LedUpdate { address, color });
                }),
            );
            self.tokens.push(token);
        }
    }

    /// Drop all subscriptions and turn the mode's LEDs off
    pub fn deactivate(&mut self, engine: &dyn ControlEngine, updates: &Sender<LedUpdate>) {
        for token in self.tokens.drain(..) {
            engine.unsubscribe(token);
        }
        for binding in &self.leds {
            let _ = updates.send(LedUpdate {
                address: MidiAddress::note(self.midi_channel, binding.note),
                color: LedColor::Off,
            });
        }
        log::debug!("Mode '{}': deactivated", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k2mix_core::{Channel, MemoryEngine};

    const CH: u8 = 14;
    const DECK: Group = Group::Channel(Channel::new(1));

    fn loop_led() -> LedBinding {
        LedBinding {
            group: DECK,
            key: ControlKey::LoopEnabled,
            note: 0x24,
            on: LedColor::Green,
            off: LedColor::Off,
        }
    }

    #[test]
    fn test_activate_replays_current_value() {
        let engine = MemoryEngine::new();
        engine.set_value(DECK, ControlKey::LoopEnabled, 1.0);
        let (tx, rx) = flume::unbounded();
        let mut mode = ModeBindings::new("overview", CH, vec![loop_led()]);

        mode.activate(&engine, &tx);

        assert!(mode.is_active());
        assert_eq!(
            rx.drain().collect::<Vec<_>>(),
            vec![LedUpdate {
                address: MidiAddress::note(CH, 0x24),
                color: LedColor::Green
            }]
        );
    }

    #[test]
    fn test_changes_follow_until_deactivated() {
        let engine = MemoryEngine::new();
        let (tx, rx) = flume::unbounded();
        let mut mode = ModeBindings::new("overview", CH, vec![loop_led()]);
        mode.activate(&engine, &tx);
        rx.drain().for_each(drop);

        engine.set_value(DECK, ControlKey::LoopEnabled, 1.0);
        assert_eq!(rx.try_recv().unwrap().color, LedColor::Green);

        mode.deactivate(&engine, &tx);
        assert_eq!(engine.subscription_count(), 0);
        assert_eq!(rx.try_recv().unwrap().color, LedColor::Off);

        engine.set_value(DECK, ControlKey::LoopEnabled, 0.0);
        engine.set_value(DECK, ControlKey::LoopEnabled, 1.0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_double_activate_keeps_one_subscription() {
        let engine = MemoryEngine::new();
        let (tx, _rx) = flume::unbounded();
        let mut mode = ModeBindings::new("deck", CH, vec![loop_led()]);
        mode.activate(&engine, &tx);
        mode.activate(&engine, &tx);
        assert_eq!(engine.subscription_count(), 1);
    }
}
