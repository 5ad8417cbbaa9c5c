//! Beat alignment of a freshly loaded deck
//!
//! Brings a stopped, silent deck into phrase with the one currently playing:
//! the target's entry cue is lined up with the reference's exit cue modulo a
//! 16-beat phrase, then a 16-beat loop around the entry cue is armed so the
//! target keeps cycling in phase until the performer brings it in.
//!
//! The procedure is a fixed sequence over fast ticks:
//!
//! ```text
//! step 0,1   phase correction
//! step 2     seek to entry cue, play, tempo sync, phase sync
//! step 3     phase correction
//! step 4     phase correction, loop [entry+8, entry+24]
//! step 5     phase correction
//! step 6     phase correction, loop moved back 16 beats
//! step 7-9   phase correction
//! step 10    phase correction, reloop if needed, done
//! ```

use crate::control::{Channel, ControlEngine, ControlKey};
use crate::deck::DeckRef;
use crate::error::Refusal;

/// Cue on the reference deck the target is lined up against
pub const EXIT_CUE: ControlKey = ControlKey::OutroStartPosition;
/// Cue on the target deck that gets lined up
pub const ENTRY_CUE: ControlKey = ControlKey::IntroStartPosition;

/// Beats per phrase
const PHRASE: f64 = 16.0;
const START_STEP: u32 = 2;
const LOOP_DEFINE_STEP: u32 = 4;
const LOOP_SHIFT_STEP: u32 = 6;
const FINAL_STEP: u32 = 10;

/// Fold a beat difference into the phrase offset nearest zero
///
/// The result lies in `[-8, 8]` and is congruent to `x` modulo 16.
pub fn wrap16(x: f64) -> f64 {
    let mut wrapped = x % PHRASE;
    while wrapped < -PHRASE / 2.0 {
        wrapped += PHRASE;
    }
    while wrapped > PHRASE / 2.0 {
        wrapped -= PHRASE;
    }
    wrapped
}

/// Whole-beat shift that puts the target's entry cue in phase with the
/// reference's exit cue
pub fn phase_correction(beats_till_exit: f64, beats_till_start: f64) -> f64 {
    wrap16(beats_till_start - beats_till_exit).round()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AlignSession {
    reference: Channel,
    target: Channel,
    step: u32,
}

#[derive(Debug, Clone)]
pub struct BeatAligner {
    session: Option<AlignSession>,
    audible_volume: f64,
}

impl Default for BeatAligner {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_AUDIBLE_VOLUME)
    }
}

impl BeatAligner {
    /// `audible_volume` is the fader level from which a deck counts as heard
    pub fn new(audible_volume: f64) -> Self {
        Self {
            session: None,
            audible_volume,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Deck being aligned, if any
    pub fn target(&self) -> Option<Channel> {
        self.session.map(|s| s.target)
    }

    /// Deck the target is aligned against, if any
    pub fn reference(&self) -> Option<Channel> {
        self.session.map(|s| s.reference)
    }

    fn is_audible(&self, deck: &DeckRef<'_>) -> bool {
        deck.get(ControlKey::Volume) >= self.audible_volume
    }

    /// Start aligning `target` against the single audible playing deck among
    /// `decks`
    ///
    /// A running session is replaced. On refusal nothing changes.
    pub fn align_and_set_loop(
        &mut self,
        engine: &dyn ControlEngine,
        target: Channel,
        decks: &[Channel],
    ) -> Result<(), Refusal> {
        let target_deck = DeckRef::new(engine, target);
        if target_deck.is_playing() || self.is_audible(&target_deck) {
            return Err(Refusal::Dangerous(target).report());
        }

        let references: Vec<Channel> = decks
            .iter()
            .copied()
            .filter(|&ch| ch != target)
            .filter(|&ch| {
                let deck = DeckRef::new(engine, ch);
                deck.is_playing() && self.is_audible(&deck)
            })
            .collect();
        let reference = match references.as_slice() {
            [single] => *single,
            [] => return Err(Refusal::NoReference(target).report()),
            many => {
                return Err(Refusal::AmbiguousReference {
                    target,
                    count: many.len(),
                }
                .report())
            }
        };

        for (channel, key) in [(reference, EXIT_CUE), (target, ENTRY_CUE)] {
            if DeckRef::new(engine, channel).cue_samples(key).is_none() {
                return Err(Refusal::MissingCue { channel, key }.report());
            }
        }

        if let Some(old) = self.session {
            log::debug!("BeatAligner: replacing session on {}", old.target);
        }
        log::info!("BeatAligner: aligning {} against {}", target, reference);
        self.session = Some(AlignSession {
            reference,
            target,
            step: 0,
        });
        Ok(())
    }

    /// Drop the running session
    pub fn abort(&mut self) {
        if let Some(session) = self.session.take() {
            log::debug!("BeatAligner: aborted on {}", session.target);
        }
    }

    /// Advance one fast tick
    pub fn tick(&mut self, engine: &dyn ControlEngine) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let step = session.step;
        session.step += 1;
        let reference = DeckRef::new(engine, session.reference);
        let target = DeckRef::new(engine, session.target);

        if !reference.has_track() || !target.has_track() {
            self.abort();
            return;
        }

        if step == START_STEP {
            let entry_beat = target.samples_to_beats(target.get(ENTRY_CUE));
            target.seek_beats(entry_beat);
            target.set(ControlKey::Play, 1.0);
            target.pulse(ControlKey::BeatsyncTempo);
            target.pulse(ControlKey::BeatsyncPhase);
            return;
        }

        let diff = phase_correction(
            reference.beats_till_cue(EXIT_CUE),
            target.beats_till_cue(ENTRY_CUE),
        );
        if diff != 0.0 {
            log::trace!("BeatAligner: step {} moving {} by {} beats", step, target.channel(), diff);
            target.nudge_beats(diff);
        }

        match step {
            LOOP_DEFINE_STEP => {
                let entry_beat = target.samples_to_beats(target.get(ENTRY_CUE));
                target.set(
                    ControlKey::LoopStartPosition,
                    target.beats_to_samples(entry_beat + 8.0),
                );
                target.set(ControlKey::LoopEndPosition, target.beats_to_samples(entry_beat + 24.0));
            }
            LOOP_SHIFT_STEP => target.pulse(ControlKey::LoopMove16Backward),
            s if s >= FINAL_STEP => {
                if target.get(ControlKey::LoopEnabled) == 0.0 {
                    target.pulse(ControlKey::ReloopToggle);
                }
                log::info!("BeatAligner: {} aligned", target.channel());
                self.session = None;
            }
            _ => {}
        }
    }
}
