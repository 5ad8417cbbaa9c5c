//! Automatic mix transitions
//!
//! Once enabled, the automixer keeps two decks in rotation: the one playing
//! (`prev`) and the one being prepared (`next`). Each fast tick advances a
//! small phase machine:
//!
//! ```text
//!           enable()
//!   Off ─────────────► Loading ──► Loaded ──► Mixing ──► Finishing
//!    ▲                    ▲                                  │
//!    │ disable()          └──────────────────────────────────┘
//!    └──── (from any phase)
//! ```
//!
//! - **Loading**: every 12th tick, make sure `prev` is the playing deck and ask
//!   the library for a track on `next`.
//! - **Loaded**: park `next` just before its sync point and wait for `prev`
//!   to reach its own.
//! - **Mixing**: cross-fade the volumes following both playheads.
//! - **Finishing**: stop and eject the old deck, start over.
//!
//! A transition is either a *long mix* (cue points on both decks and close
//! tempos: synced, tempo-matched over a fixed length) or a short cut around
//! the end of the outgoing track.

use crate::aligner::BeatAligner;
use crate::config::AutomixConfig;
use crate::control::{sync_mode, Channel, ControlEngine, ControlKey, Group};
use crate::curve::TransitionCurve;
use crate::deck::DeckRef;
use crate::error::Refusal;
use crate::led::LedColor;
use std::collections::HashMap;

/// Ticks per LED blink cycle, also the loading debounce
const TICK_CYCLE: u8 = 12;
const CROSSFADER_CENTER: f64 = 0.0;

/// Automixer phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Off,
    Loading,
    Loaded,
    Mixing,
    Finishing,
}

impl Phase {
    /// Whether `self -> to` is an edge of the phase machine
    pub fn can_transition_to(self, to: Phase) -> bool {
        matches!(
            (self, to),
            (_, Phase::Off)
                | (Phase::Off, Phase::Loading)
                | (Phase::Loading, Phase::Loaded)
                | (Phase::Loaded, Phase::Mixing)
                | (Phase::Mixing, Phase::Finishing)
                | (Phase::Finishing, Phase::Loading)
        )
    }
}

/// Where and how a transition happens, in beats of each deck
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionPoints {
    /// Beat on `prev` at the centre of the transition
    pub prev_sync_beat: f64,
    /// Beat on `next` at the centre of the transition
    pub next_sync_beat: f64,
    pub long_mix: bool,
    /// Half the transition length, in beats
    pub half_period_beats: f64,
}

/// Transition parameters frozen when mixing starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionSnapshot {
    pub points: TransitionPoints,
    /// Tempo of `prev` when mixing started, lerped toward `next`'s file tempo
    pub start_bpm: f64,
}

/// Pick the transition for the current pair of tracks
pub fn transition_points(
    prev: &DeckRef<'_>,
    next: &DeckRef<'_>,
    config: &AutomixConfig,
) -> TransitionPoints {
    let outro_start = prev.cue_samples(ControlKey::OutroStartPosition);
    let intro_end = next.cue_samples(ControlKey::IntroEndPosition);
    let tempo_close = (next.file_bpm() - prev.bpm()).abs() <= config.long_mix_max_bpm_diff;

    if let (Some(outro_start), Some(intro_end), true) = (outro_start, intro_end, tempo_close) {
        return TransitionPoints {
            prev_sync_beat: prev.samples_to_beats(outro_start),
            next_sync_beat: next.samples_to_beats(intro_end),
            long_mix: true,
            half_period_beats: next.seconds_to_beats(config.transition_half_seconds),
        };
    }

    let outro_end = prev.get(ControlKey::OutroEndPosition);
    let prev_sync_beat = if outro_end > 0.0 {
        prev.samples_to_beats(outro_end)
    } else {
        prev.seconds_to_beats(prev.duration_seconds())
    };
    let intro_start = next.get(ControlKey::IntroStartPosition);
    let next_sync_beat = if intro_start > 0.0 {
        next.samples_to_beats(intro_start)
    } else {
        0.0
    };
    TransitionPoints {
        prev_sync_beat,
        next_sync_beat,
        long_mix: false,
        half_period_beats: 1.0,
    }
}

/// Crossfade progress in `[0, 1]`
///
/// Before `prev` reaches its sync beat the progress follows `prev`, after it
/// follows `next`, meeting at 0.5 on the sync point.
pub fn mix_progress(
    points: &TransitionPoints,
    prev_position_beats: f64,
    next_position_beats: f64,
    prev_playing: bool,
) -> f64 {
    let span = 2.0 * points.half_period_beats;
    if !prev_playing || span <= 0.0 {
        return 1.0;
    }
    let beats_to_exit = points.prev_sync_beat - prev_position_beats;
    let progress = if beats_to_exit > 0.0 {
        (0.5 - beats_to_exit / span).max(0.0)
    } else {
        0.5 + (next_position_beats - points.next_sync_beat) / span
    };
    progress.clamp(0.0, 1.0)
}

pub struct AutoMixer {
    phase: Phase,
    prev: Channel,
    next: Channel,
    tick_counter: u8,
    led_color: LedColor,
    points: Option<TransitionPoints>,
    snapshot: Option<TransitionSnapshot>,
    aligner: BeatAligner,
    curve: Box<dyn TransitionCurve>,
    config: AutomixConfig,
    /// Last seen `track_loaded` per deck, for load detection
    loaded: HashMap<Channel, bool>,
}

impl AutoMixer {
    pub fn new(config: AutomixConfig) -> Self {
        let [prev, next] = config.automix_decks;
        Self {
            phase: Phase::Off,
            prev,
            next,
            tick_counter: 0,
            led_color: LedColor::Off,
            points: None,
            snapshot: None,
            aligner: BeatAligner::new(config.audible_volume),
            curve: config.curve.build(),
            config,
            loaded: HashMap::new(),
        }
    }

    /// Replace the configured transition curve
    pub fn with_curve(mut self, curve: Box<dyn TransitionCurve>) -> Self {
        self.curve = curve;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Colour the automix button should show this tick
    pub fn led_color(&self) -> LedColor {
        self.led_color
    }

    /// Outgoing deck
    pub fn prev(&self) -> Channel {
        self.prev
    }

    /// Incoming deck
    pub fn next(&self) -> Channel {
        self.next
    }

    pub fn tick_counter(&self) -> u8 {
        self.tick_counter
    }

    /// Transition points of the pending mix, refreshed every `Loaded` tick
    pub fn transition_points(&self) -> Option<TransitionPoints> {
        self.points
    }

    /// Parameters of the running mix
    pub fn snapshot(&self) -> Option<TransitionSnapshot> {
        self.snapshot
    }

    pub fn aligner(&self) -> &BeatAligner {
        &self.aligner
    }

    pub fn config(&self) -> &AutomixConfig {
        &self.config
    }

    /// Arm the automixer
    ///
    /// Refused unless exactly one of the two decks is playing.
    pub fn enable(&mut self, engine: &dyn ControlEngine) -> Result<(), Refusal> {
        if self.phase != Phase::Off {
            return Err(Refusal::AlreadyEnabled.report());
        }
        let decks = [DeckRef::new(engine, self.prev), DeckRef::new(engine, self.next)];
        let playing = decks.iter().filter(|d| d.is_playing()).count();
        if playing != 1 {
            return Err(Refusal::PlayingDeckCount(playing).report());
        }

        for deck in &decks {
            deck.set_soft_takeover(ControlKey::Volume, true);
        }
        self.tick_counter = 0;
        log::info!("AutoMixer: enabled on {} / {}", self.prev, self.next);
        self.set_phase(Phase::Loading);
        Ok(())
    }

    /// Stop automation and hand the mixer back
    ///
    /// Always performs the reset, even when already off.
    pub fn disable(&mut self, engine: &dyn ControlEngine) {
        if self.phase == Phase::Mixing {
            self.curve.clean(engine, self.prev, self.next);
        }
        engine.set_value(Group::Master, ControlKey::Crossfader, CROSSFADER_CENTER);
        for channel in [self.prev, self.next] {
            DeckRef::new(engine, channel).set_soft_takeover(ControlKey::Volume, false);
        }
        self.led_color = LedColor::Off;
        self.points = None;
        self.snapshot = None;
        if self.phase != Phase::Off {
            log::info!("AutoMixer: disabled");
        }
        self.set_phase(Phase::Off);
    }

    pub fn toggle(&mut self, engine: &dyn ControlEngine) -> Result<(), Refusal> {
        if self.phase == Phase::Off {
            self.enable(engine)
        } else {
            self.disable(engine);
            Ok(())
        }
    }

    /// Line `target` up with the playing deck and loop it in phrase
    pub fn align_and_set_loop(
        &mut self,
        engine: &dyn ControlEngine,
        target: Channel,
    ) -> Result<(), Refusal> {
        self.aligner
            .align_and_set_loop(engine, target, &self.config.decks)
    }

    /// Advance one fast tick
    pub fn tick(&mut self, engine: &dyn ControlEngine) {
        self.tick_counter = (self.tick_counter + 1) % TICK_CYCLE;
        self.watch_loads(engine);

        if self.phase != Phase::Off {
            let prev = DeckRef::new(engine, self.prev);
            let next = DeckRef::new(engine, self.next);
            if !prev.has_track() && !next.has_track() {
                log::warn!("AutoMixer: both decks empty, disabling");
                self.disable(engine);
            } else {
                match self.phase {
                    Phase::Loading => self.tick_loading(engine),
                    Phase::Loaded => self.tick_loaded(engine),
                    Phase::Mixing => self.tick_mixing(engine),
                    Phase::Finishing => self.tick_finishing(engine),
                    Phase::Off => {}
                }
            }
        }

        self.aligner.tick(engine);
        self.led_color = self.blink_color();
    }

    fn set_phase(&mut self, to: Phase) {
        if to == self.phase {
            return;
        }
        if !self.phase.can_transition_to(to) {
            log::error!("AutoMixer: illegal transition {:?} -> {:?}", self.phase, to);
            return;
        }
        log::debug!("AutoMixer: {:?} -> {:?}", self.phase, to);
        self.phase = to;
    }

    fn tick_loading(&mut self, engine: &dyn ControlEngine) {
        if self.tick_counter != 0 {
            return;
        }
        if DeckRef::new(engine, self.next).is_playing() {
            std::mem::swap(&mut self.prev, &mut self.next);
            log::debug!("AutoMixer: roles swapped, {} now outgoing", self.prev);
        }
        if DeckRef::new(engine, self.next).has_track() {
            engine.set_value(Group::Master, ControlKey::Crossfader, CROSSFADER_CENTER);
            self.set_phase(Phase::Loaded);
        } else {
            log::debug!("AutoMixer: requesting a track for {}", self.next);
            engine.set_value(Group::Playlist, ControlKey::LoadSelectedIntoFirstStopped, 1.0);
            engine.set_value(Group::Playlist, ControlKey::LoadSelectedIntoFirstStopped, 0.0);
        }
    }

    fn tick_loaded(&mut self, engine: &dyn ControlEngine) {
        let prev = DeckRef::new(engine, self.prev);
        let next = DeckRef::new(engine, self.next);
        let points = transition_points(&prev, &next, &self.config);
        self.points = Some(points);

        next.seek_beats(points.next_sync_beat - points.half_period_beats);
        if points.prev_sync_beat > prev.current_position_beats() + points.half_period_beats {
            return;
        }

        next.set(ControlKey::Play, 1.0);
        let snapshot = TransitionSnapshot {
            points,
            start_bpm: prev.bpm(),
        };
        if points.long_mix {
            next.pulse(ControlKey::BeatsyncPhase);
            next.set(ControlKey::SyncEnabled, 1.0);
            prev.set(ControlKey::SyncEnabled, 1.0);
            next.set(ControlKey::SyncMode, sync_mode::LEADER);
            prev.set(ControlKey::SyncMode, sync_mode::FOLLOWER);
        } else {
            for deck in [&prev, &next] {
                deck.set(ControlKey::SyncEnabled, 0.0);
                deck.set(ControlKey::SyncMode, sync_mode::NONE);
            }
            next.set(ControlKey::Rate, 0.0);
        }
        prev.suppress_next_external_write(ControlKey::Volume);
        next.suppress_next_external_write(ControlKey::Volume);

        log::info!(
            "AutoMixer: {} mix {} -> {} ({:.1} beats)",
            if points.long_mix { "long" } else { "short" },
            self.prev,
            self.next,
            2.0 * points.half_period_beats
        );
        self.snapshot = Some(snapshot);
        self.set_phase(Phase::Mixing);
    }

    fn tick_mixing(&mut self, engine: &dyn ControlEngine) {
        let Some(snapshot) = self.snapshot else {
            log::error!("AutoMixer: mixing without a snapshot");
            self.disable(engine);
            return;
        };
        let prev = DeckRef::new(engine, self.prev);
        let next = DeckRef::new(engine, self.next);
        let points = snapshot.points;
        let progress = mix_progress(
            &points,
            prev.current_position_beats(),
            next.current_position_beats(),
            prev.is_playing(),
        );

        if progress <= 0.5 {
            next.set(ControlKey::Volume, 2.0 * progress);
        }
        if progress >= 0.5 {
            prev.set(ControlKey::Volume, 2.0 * (1.0 - progress));
        }
        if points.long_mix {
            let bpm = snapshot.start_bpm + (next.file_bpm() - snapshot.start_bpm) * progress;
            next.set(ControlKey::Bpm, bpm);
        }

        if progress < 1.0 {
            if points.long_mix {
                self.curve.tick(engine, self.prev, self.next, progress);
            }
            return;
        }

        self.curve.clean(engine, self.prev, self.next);
        next.set(ControlKey::Volume, 1.0);
        prev.suppress_next_external_write(ControlKey::Volume);
        next.suppress_next_external_write(ControlKey::Volume);
        self.set_phase(Phase::Finishing);
    }

    fn tick_finishing(&mut self, engine: &dyn ControlEngine) {
        let prev = DeckRef::new(engine, self.prev);
        prev.set(ControlKey::Play, 0.0);
        prev.pulse(ControlKey::Eject);
        log::info!("AutoMixer: {} done, ejected", self.prev);
        self.snapshot = None;
        self.points = None;
        self.set_phase(Phase::Loading);
    }

    /// Start beat alignment on decks that just received a track with sync on
    fn watch_loads(&mut self, engine: &dyn ControlEngine) {
        for &channel in &self.config.decks {
            let deck = DeckRef::new(engine, channel);
            let loaded = deck.has_track();
            let was_loaded = self.loaded.insert(channel, loaded).unwrap_or(loaded);
            if !self.config.align_on_load || self.phase != Phase::Off {
                continue;
            }
            if loaded && !was_loaded && deck.get(ControlKey::SyncEnabled) != 0.0 {
                log::debug!("AutoMixer: {} loaded under sync, aligning", channel);
                // A refusal is already reported; nothing else to do
                let _ = self
                    .aligner
                    .align_and_set_loop(engine, channel, &self.config.decks);
            }
        }
    }

    fn blink_color(&self) -> LedColor {
        let odd = self.tick_counter % 2 == 1;
        let (limit, color) = match self.phase {
            Phase::Loading => (6, LedColor::Amber),
            Phase::Loaded => {
                let long_mix = self.points.is_some_and(|p| p.long_mix);
                (if long_mix { 5 } else { 3 }, LedColor::Green)
            }
            Phase::Mixing => (7, LedColor::Green),
            Phase::Off | Phase::Finishing => return LedColor::Off,
        };
        LedColor::when(odd && self.tick_counter < limit, color)
    }
}
