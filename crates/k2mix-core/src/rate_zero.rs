//! Rate-zeroing assistant
//!
//! Pressing "tempo zero" on a playing deck would jump the tempo audibly, so
//! the offset is walked back to zero a small step per slow tick instead. A
//! stopped, unsynced deck is zeroed on the spot.

use crate::control::{Channel, ControlEngine, ControlKey};
use crate::deck::DeckRef;

/// Default per-tick rate step
pub const RATE_STEP: f64 = 0.005;

/// Absorbs float drift accumulated over repeated steps
const RATE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct RateZeroer {
    armed: Option<Channel>,
    enabled: bool,
    led_on: bool,
    step: f64,
}

impl Default for RateZeroer {
    fn default() -> Self {
        Self::new(RATE_STEP)
    }
}

impl RateZeroer {
    pub fn new(step: f64) -> Self {
        Self {
            armed: None,
            enabled: false,
            led_on: false,
            step: step.abs().max(RATE_EPSILON),
        }
    }

    /// Bring `channel`'s rate offset back to zero
    pub fn zero_deck(&mut self, engine: &dyn ControlEngine, channel: Channel) {
        let deck = DeckRef::new(engine, channel);
        self.armed = Some(channel);
        if !deck.is_playing() && !deck.is_synced() {
            deck.set(ControlKey::Rate, 0.0);
            log::debug!("RateZeroer: {} stopped, rate zeroed immediately", channel);
            self.disable();
            return;
        }
        log::info!(
            "RateZeroer: armed on {} (rate {:.3})",
            channel,
            deck.get(ControlKey::Rate)
        );
        self.enabled = true;
    }

    /// Advance one slow tick
    pub fn tick(&mut self, engine: &dyn ControlEngine) {
        if !self.enabled {
            return;
        }
        let Some(channel) = self.armed else {
            self.disable();
            return;
        };
        let deck = DeckRef::new(engine, channel);
        if !deck.has_track() {
            log::debug!("RateZeroer: {} ejected, giving up", channel);
            self.disable();
            return;
        }

        let current = deck.get(ControlKey::Rate);
        let direction = if current > 0.0 {
            -1.0
        } else if current < 0.0 {
            1.0
        } else {
            0.0
        };
        let stepped = current + direction * self.step;
        if stepped.abs() + RATE_EPSILON < self.step {
            deck.set(ControlKey::Rate, 0.0);
            log::info!("RateZeroer: {} back at zero", channel);
            self.disable();
        } else {
            deck.set(ControlKey::Rate, stepped);
            self.led_on = !self.led_on;
        }
    }

    pub fn disable(&mut self) {
        self.enabled = false;
        self.led_on = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Blink state of the assistant's indicator
    pub fn led_on(&self) -> bool {
        self.led_on
    }

    pub fn armed_channel(&self) -> Option<Channel> {
        self.armed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryEngine;

    const DECK: Channel = Channel::new(1);

    fn loaded(engine: &MemoryEngine, rate: f64, playing: bool) -> DeckRef<'_> {
        let deck = DeckRef::new(engine, DECK);
        deck.set(ControlKey::TrackLoaded, 1.0);
        deck.set(ControlKey::Rate, rate);
        deck.set(ControlKey::Play, if playing { 1.0 } else { 0.0 });
        deck
    }

    #[test]
    fn test_paused_deck_zeroes_without_ticks() {
        let engine = MemoryEngine::new();
        let deck = loaded(&engine, 0.13, false);
        let mut zeroer = RateZeroer::default();

        zeroer.zero_deck(&engine, DECK);

        assert_eq!(deck.get(ControlKey::Rate), 0.0);
        assert!(!zeroer.is_enabled());
    }

    #[test]
    fn test_synced_deck_is_walked_back() {
        let engine = MemoryEngine::new();
        let deck = loaded(&engine, 0.01, false);
        deck.set(ControlKey::SyncEnabled, 1.0);
        let mut zeroer = RateZeroer::default();

        zeroer.zero_deck(&engine, DECK);
        assert!(zeroer.is_enabled());
        assert_eq!(deck.get(ControlKey::Rate), 0.01);
    }

    #[test]
    fn test_playing_deck_takes_forty_ticks_from_point_two() {
        let engine = MemoryEngine::new();
        let deck = loaded(&engine, 0.2, true);
        let mut zeroer = RateZeroer::default();
        zeroer.zero_deck(&engine, DECK);

        let mut ticks = 0;
        let mut last_led = zeroer.led_on();
        while zeroer.is_enabled() {
            zeroer.tick(&engine);
            ticks += 1;
            if zeroer.is_enabled() {
                assert_ne!(zeroer.led_on(), last_led, "led must flip every armed tick");
                last_led = zeroer.led_on();
            }
            assert!(ticks <= 100);
        }

        assert_eq!(ticks, 40);
        assert_eq!(deck.get(ControlKey::Rate), 0.0);
        assert!(!zeroer.led_on());
    }

    #[test]
    fn test_negative_offset_steps_up() {
        let engine = MemoryEngine::new();
        let deck = loaded(&engine, -0.017, true);
        let mut zeroer = RateZeroer::default();
        zeroer.zero_deck(&engine, DECK);

        zeroer.tick(&engine);
        assert!((deck.get(ControlKey::Rate) + 0.012).abs() < 1e-12);
        zeroer.tick(&engine);
        assert!((deck.get(ControlKey::Rate) + 0.007).abs() < 1e-12);
        assert!(zeroer.is_enabled());
        // -0.002 is inside one step: snaps instead of stopping short
        zeroer.tick(&engine);
        assert_eq!(deck.get(ControlKey::Rate), 0.0);
        assert!(!zeroer.is_enabled());
    }

    #[test]
    fn test_snaps_when_within_one_step() {
        let engine = MemoryEngine::new();
        let deck = loaded(&engine, 0.008, true);
        let mut zeroer = RateZeroer::default();
        zeroer.zero_deck(&engine, DECK);

        zeroer.tick(&engine);
        assert_eq!(deck.get(ControlKey::Rate), 0.0);
        assert!(!zeroer.is_enabled());
        assert!(!zeroer.led_on());
    }

    #[test]
    fn test_eject_disables() {
        let engine = MemoryEngine::new();
        let deck = loaded(&engine, 0.1, true);
        let mut zeroer = RateZeroer::default();
        zeroer.zero_deck(&engine, DECK);

        deck.set(ControlKey::TrackLoaded, 0.0);
        zeroer.tick(&engine);
        assert!(!zeroer.is_enabled());
        assert_eq!(deck.get(ControlKey::Rate), 0.1);
    }

    #[test]
    fn test_tick_when_disabled_is_noop() {
        let engine = MemoryEngine::new();
        loaded(&engine, 0.1, true);
        engine.take_writes();
        let mut zeroer = RateZeroer::default();
        zeroer.tick(&engine);
        assert!(engine.take_writes().is_empty());
    }
}
