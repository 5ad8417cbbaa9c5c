//! Controller session
//!
//! One session per controller mapping instance. It owns the automixer and
//! rate zeroer, the mode layers, the press queue and the LED sink.
//!
//! # Ticks
//!
//! ```text
//! host loop ──poll(now)──► Ticker ──► fast_tick: drain presses, AutoMixer, automix LED
//!                                 └─► slow_tick: RateZeroer, rate LED
//! ```
//!
//! The automix LED is pushed on the fast tick because its blink pattern is
//! counted in fast ticks. Everything runs on the caller's thread; only the
//! [`PressSender`] crosses threads.

use crate::config::{Action, ControllerProfile};
use crate::input::{press_queue, PressSender};
use crate::layer::{LedUpdate, ModeBindings};
use crate::led::{LedColor, LedSink};
use crate::types::{ButtonPress, MidiAddress};
use flume::{Receiver, Sender};
use k2mix_core::{AutoMixer, AutomixConfig, ControlEngine, DeckRef, RateZeroer};
use std::time::{Duration, Instant};

/// Which ticks are due after a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DueTicks {
    pub fast: bool,
    pub slow: bool,
}

/// Decides when the fast and slow ticks run
///
/// A late poll runs each tick at most once and restarts its schedule from
/// `now`; missed ticks are not replayed in a burst.
#[derive(Debug, Clone)]
pub struct Ticker {
    fast: Duration,
    slow: Duration,
    next_fast: Option<Instant>,
    next_slow: Option<Instant>,
}

impl Ticker {
    pub fn new(fast: Duration, slow: Duration) -> Self {
        Self {
            fast,
            slow,
            next_fast: None,
            next_slow: None,
        }
    }

    pub fn from_config(config: &AutomixConfig) -> Self {
        Self::new(
            Duration::from_millis(config.fast_tick_ms),
            Duration::from_millis(config.slow_tick_ms),
        )
    }

    pub fn poll(&mut self, now: Instant) -> DueTicks {
        DueTicks {
            fast: Self::due(&mut self.next_fast, self.fast, now),
            slow: Self::due(&mut self.next_slow, self.slow, now),
        }
    }

    fn due(next: &mut Option<Instant>, interval: Duration, now: Instant) -> bool {
        match *next {
            Some(at) if now < at => false,
            Some(at) => {
                let following = at + interval;
                *next = Some(if following <= now { now + interval } else { following });
                true
            }
            None => {
                *next = Some(now + interval);
                true
            }
        }
    }
}

pub struct ControllerSession<S: LedSink> {
    mixer: AutoMixer,
    zeroer: RateZeroer,
    ticker: Ticker,
    profile: ControllerProfile,
    modes: Vec<ModeBindings>,
    active_mode: usize,
    presses: Receiver<ButtonPress>,
    led_tx: Sender<LedUpdate>,
    led_rx: Receiver<LedUpdate>,
    /// LED of the button that armed the rate zeroer
    rate_zero_led: Option<MidiAddress>,
    sink: S,
}

impl<S: LedSink> ControllerSession<S> {
    /// Create a session and the press sender to hand to the MIDI callback
    pub fn new(config: AutomixConfig, profile: ControllerProfile, sink: S) -> (Self, PressSender) {
        let (press_tx, presses) = press_queue();
        let (led_tx, led_rx) = flume::unbounded();
        let session = Self {
            zeroer: RateZeroer::new(config.rate_zero_step),
            ticker: Ticker::from_config(&config),
            mixer: AutoMixer::new(config),
            modes: profile.mode_bindings(),
            profile,
            active_mode: 0,
            presses,
            led_tx,
            led_rx,
            rate_zero_led: None,
            sink,
        };
        (session, press_tx)
    }

    /// Activate the first mode and paint the surface
    pub fn start(&mut self, engine: &dyn ControlEngine) {
        log::info!("Controller '{}': starting", self.profile.name);
        self.switch_mode(engine, 0);
        let automix = self.profile.address(self.profile.automix_button);
        self.sink.set_led(automix, self.mixer.led_color());
    }

    /// Run whichever ticks are due at `now`
    pub fn poll(&mut self, engine: &dyn ControlEngine, now: Instant) {
        let due = self.ticker.poll(now);
        if due.fast {
            self.fast_tick(engine);
        }
        if due.slow {
            self.slow_tick(engine);
        }
    }

    pub fn fast_tick(&mut self, engine: &dyn ControlEngine) {
        let pending: Vec<ButtonPress> = self.presses.drain().collect();
        for press in pending {
            self.handle_press(engine, press);
        }
        self.mixer.tick(engine);
        let automix = self.profile.address(self.profile.automix_button);
        self.sink.set_led(automix, self.mixer.led_color());
        self.flush_leds();
    }

    pub fn slow_tick(&mut self, engine: &dyn ControlEngine) {
        self.zeroer.tick(engine);
        if let Some(address) = self.rate_zero_led {
            self.sink
                .set_led(address, LedColor::when(self.zeroer.led_on(), LedColor::Red));
            if !self.zeroer.is_enabled() {
                self.rate_zero_led = None;
            }
        }
        self.flush_leds();
    }

    /// Act on one button event for the active mode
    pub fn handle_press(&mut self, engine: &dyn ControlEngine, press: ButtonPress) {
        let MidiAddress::Note { channel, note } = press.address else {
            return;
        };
        if !press.pressed || channel != self.profile.midi_channel {
            return;
        }

        let action = if note == self.profile.mode_button {
            Some(Action::NextMode)
        } else if note == self.profile.automix_button {
            Some(Action::ToggleAutomix)
        } else {
            self.profile
                .modes
                .get(self.active_mode)
                .and_then(|mode| mode.action_for(note))
        };
        match action {
            Some(action) => self.dispatch(engine, action, press.address),
            None => log::trace!("Controller: no action for note {:#04x}", note),
        }
    }

    /// Run an action triggered from `address`
    pub fn dispatch(&mut self, engine: &dyn ControlEngine, action: Action, address: MidiAddress) {
        log::debug!("Controller: {:?}", action);
        // Refusals are logged where they are raised
        match action {
            Action::ToggleAutomix => {
                let _ = self.mixer.toggle(engine);
            }
            Action::ZeroRate { channel } => {
                if let Some(previous) = self.rate_zero_led.replace(address) {
                    if previous != address {
                        self.sink.set_led(previous, LedColor::Off);
                    }
                }
                self.zeroer.zero_deck(engine, channel);
                if !self.zeroer.is_enabled() {
                    self.sink.set_led(address, LedColor::Off);
                    self.rate_zero_led = None;
                }
            }
            Action::AlignAndSetLoop { channel } => {
                let _ = self.mixer.align_and_set_loop(engine, channel);
            }
            Action::Reloop { channel } => DeckRef::new(engine, channel).reloop(),
            Action::NextMode => {
                let next = (self.active_mode + 1) % self.modes.len().max(1);
                self.switch_mode(engine, next);
            }
        }
    }

    fn switch_mode(&mut self, engine: &dyn ControlEngine, index: usize) {
        if let Some(current) = self.modes.get_mut(self.active_mode) {
            if current.is_active() {
                current.deactivate(engine, &self.led_tx);
            }
        }
        self.active_mode = index;
        let Some(mode) = self.modes.get_mut(index) else {
            log::warn!("Controller: profile has no modes");
            return;
        };
        mode.activate(engine, &self.led_tx);
        log::info!("Controller: mode '{}'", mode.name());

        let indicator = self
            .profile
            .modes
            .get(index)
            .map(|m| m.indicator)
            .unwrap_or_default();
        self.sink
            .set_led(self.profile.address(self.profile.mode_button), indicator);
        self.flush_leds();
    }

    fn flush_leds(&mut self) {
        for update in self.led_rx.drain() {
            self.sink.set_led(update.address, update.color);
        }
    }

    /// Drop subscriptions, stop automation and darken the surface
    pub fn shutdown(&mut self, engine: &dyn ControlEngine) {
        if let Some(current) = self.modes.get_mut(self.active_mode) {
            current.deactivate(engine, &self.led_tx);
        }
        self.mixer.disable(engine);
        self.zeroer.disable();
        for note in [self.profile.automix_button, self.profile.mode_button] {
            self.sink.set_led(self.profile.address(note), LedColor::Off);
        }
        if let Some(address) = self.rate_zero_led.take() {
            self.sink.set_led(address, LedColor::Off);
        }
        self.flush_leds();
        log::info!("Controller '{}': stopped", self.profile.name);
    }

    pub fn mixer(&self) -> &AutoMixer {
        &self.mixer
    }

    pub fn zeroer(&self) -> &RateZeroer {
        &self.zeroer
    }

    pub fn active_mode(&self) -> &str {
        self.modes
            .get(self.active_mode)
            .map(ModeBindings::name)
            .unwrap_or_default()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::letter_note;
    use k2mix_core::{Channel, ControlKey, Group, MemoryEngine, Phase};

    const CH: u8 = 14;

    #[derive(Default)]
    struct RecordingSink {
        leds: Vec<(MidiAddress, LedColor)>,
    }

    impl RecordingSink {
        fn last(&self, note: u8) -> Option<LedColor> {
            self.leds
                .iter()
                .rev()
                .find(|(a, _)| *a == MidiAddress::note(CH, note))
                .map(|(_, c)| *c)
        }
    }

    impl LedSink for RecordingSink {
        fn set_led(&mut self, address: MidiAddress, color: LedColor) {
            self.leds.push((address, color));
        }
    }

    fn letter(c: char) -> u8 {
        letter_note(c).unwrap()
    }

    fn press(note: u8) -> Vec<u8> {
        vec![0x90 | CH, note, 0x7F]
    }

    fn session() -> (ControllerSession<RecordingSink>, PressSender) {
        let _ = env_logger::builder().is_test(true).try_init();
        ControllerSession::new(
            AutomixConfig::default(),
            ControllerProfile::default(),
            RecordingSink::default(),
        )
    }

    fn loaded_deck(engine: &MemoryEngine, ch: u8) -> DeckRef<'_> {
        let deck = DeckRef::new(engine, Channel::new(ch));
        deck.set(ControlKey::TrackLoaded, 1.0);
        deck.set(ControlKey::Bpm, 120.0);
        deck.set(ControlKey::Duration, 300.0);
        deck
    }

    #[test]
    fn test_start_replays_mode_leds() {
        let engine = MemoryEngine::new();
        engine.set_value(Group::Channel(Channel::new(1)), ControlKey::LoopEnabled, 1.0);
        let (mut session, _tx) = session();

        session.start(&engine);

        assert_eq!(session.active_mode(), "deck");
        assert_eq!(session.sink().last(letter('a')), Some(LedColor::Green));
        assert_eq!(session.sink().last(letter('i')), Some(LedColor::Amber));
        assert_eq!(session.sink().last(0x0C), Some(LedColor::Off));
    }

    #[test]
    fn test_queued_press_toggles_automix_on_fast_tick() {
        let engine = MemoryEngine::new();
        loaded_deck(&engine, 1).set(ControlKey::Play, 1.0);
        loaded_deck(&engine, 2);
        let (mut session, tx) = session();
        session.start(&engine);

        assert!(tx.on_midi(&press(letter('p'))));
        assert_eq!(session.mixer().phase(), Phase::Off);

        session.fast_tick(&engine);
        assert_eq!(session.mixer().phase(), Phase::Loading);
        assert_eq!(session.sink().last(letter('p')), Some(LedColor::Amber));

        tx.on_midi(&press(letter('p')));
        session.fast_tick(&engine);
        assert_eq!(session.mixer().phase(), Phase::Off);
        assert_eq!(session.sink().last(letter('p')), Some(LedColor::Off));
    }

    #[test]
    fn test_mode_button_switches_layer() {
        let engine = MemoryEngine::new();
        engine.set_value(Group::Channel(Channel::new(3)), ControlKey::LoopEnabled, 1.0);
        let (mut session, tx) = session();
        session.start(&engine);
        let subscriptions = engine.subscription_count();

        tx.on_midi(&press(0x0C));
        session.fast_tick(&engine);

        assert_eq!(session.active_mode(), "overview");
        assert_eq!(session.sink().last(0x0C), Some(LedColor::Amber));
        // Column a follows deck 3 now
        assert_eq!(session.sink().last(letter('a')), Some(LedColor::Green));
        assert_eq!(session.sink().last(letter('i')), Some(LedColor::Off));
        assert_eq!(engine.subscription_count(), 3);
        assert_ne!(subscriptions, 3);

        tx.on_midi(&press(0x0C));
        session.fast_tick(&engine);
        assert_eq!(session.active_mode(), "deck");
    }

    #[test]
    fn test_zero_rate_blinks_then_clears() {
        let engine = MemoryEngine::new();
        let deck = loaded_deck(&engine, 1);
        deck.set(ControlKey::Play, 1.0);
        deck.set(ControlKey::Rate, 0.013);
        let (mut session, _tx) = session();
        session.start(&engine);

        let button = MidiAddress::note(CH, letter('e'));
        session.handle_press(&engine, ButtonPress { address: button, pressed: true });
        assert!(session.zeroer().is_enabled());

        session.slow_tick(&engine);
        assert!((deck.get(ControlKey::Rate) - 0.008).abs() < 1e-12);
        assert_eq!(session.sink().last(letter('e')), Some(LedColor::Red));

        session.slow_tick(&engine);
        assert_eq!(deck.get(ControlKey::Rate), 0.0);
        assert!(!session.zeroer().is_enabled());
        assert_eq!(session.sink().last(letter('e')), Some(LedColor::Off));
    }

    #[test]
    fn test_releases_and_foreign_channels_ignored() {
        let engine = MemoryEngine::new();
        loaded_deck(&engine, 1).set(ControlKey::Play, 1.0);
        let (mut session, _tx) = session();
        session.start(&engine);

        let p = letter('p');
        session.handle_press(
            &engine,
            ButtonPress {
                address: MidiAddress::note(CH, p),
                pressed: false,
            },
        );
        session.handle_press(
            &engine,
            ButtonPress {
                address: MidiAddress::note(3, p),
                pressed: true,
            },
        );
        assert_eq!(session.mixer().phase(), Phase::Off);
    }

    #[test]
    fn test_shutdown_unsubscribes() {
        let engine = MemoryEngine::new();
        let (mut session, _tx) = session();
        session.start(&engine);
        assert!(engine.subscription_count() > 0);

        session.shutdown(&engine);
        assert_eq!(engine.subscription_count(), 0);
        assert_eq!(session.sink().last(letter('a')), Some(LedColor::Off));
    }

    #[test]
    fn test_ticker_cadence() {
        let t0 = Instant::now();
        let ms = Duration::from_millis;
        let mut ticker = Ticker::new(ms(50), ms(100));

        assert_eq!(ticker.poll(t0), DueTicks { fast: true, slow: true });
        assert_eq!(ticker.poll(t0 + ms(20)), DueTicks::default());
        assert_eq!(ticker.poll(t0 + ms(50)), DueTicks { fast: true, slow: false });
        assert_eq!(ticker.poll(t0 + ms(100)), DueTicks { fast: true, slow: true });
        assert_eq!(ticker.poll(t0 + ms(120)), DueTicks::default());
    }

    #[test]
    fn test_ticker_late_poll_does_not_burst() {
        let t0 = Instant::now();
        let ms = Duration::from_millis;
        let mut ticker = Ticker::new(ms(50), ms(100));
        ticker.poll(t0);

        assert_eq!(ticker.poll(t0 + ms(400)), DueTicks { fast: true, slow: true });
        assert_eq!(ticker.poll(t0 + ms(410)), DueTicks::default());
        assert_eq!(ticker.poll(t0 + ms(450)), DueTicks { fast: true, slow: false });
    }

    #[test]
    fn test_poll_drives_both_ticks() {
        let engine = MemoryEngine::new();
        loaded_deck(&engine, 1).set(ControlKey::Play, 1.0);
        loaded_deck(&engine, 2);
        let (mut session, tx) = session();
        session.start(&engine);
        tx.on_midi(&press(letter('p')));

        let t0 = Instant::now();
        session.poll(&engine, t0);
        assert_eq!(session.mixer().phase(), Phase::Loading);
        assert_eq!(session.mixer().tick_counter(), 1);

        session.poll(&engine, t0 + Duration::from_millis(10));
        assert_eq!(session.mixer().tick_counter(), 1);
        session.poll(&engine, t0 + Duration::from_millis(50));
        assert_eq!(session.mixer().tick_counter(), 2);
    }
}
