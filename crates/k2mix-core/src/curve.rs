//! Secondary effect moved along with the volume crossfade
//!
//! A curve only sees the progress value, so every write is a pure function of
//! progress. Moving progress backwards moves the effect backwards too.

use crate::control::{Channel, ControlEngine, ControlKey, Group};
use serde::{Deserialize, Serialize};

/// Effect strategy used during a long mix
pub trait TransitionCurve {
    /// Apply the effect for `progress` in `[0, 1)`
    fn tick(&mut self, engine: &dyn ControlEngine, prev: Channel, next: Channel, progress: f64);

    /// Put the effect back to neutral on both decks
    ///
    /// Must be safe to call more than once.
    fn clean(&mut self, engine: &dyn ControlEngine, prev: Channel, next: Channel);
}

/// Configurable curve selection
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CurveKind {
    /// Volume only
    #[default]
    Flat,
    /// Quick effect filter sweep
    FilterSweep { depth: f64 },
    /// Hand the low band over at the midpoint
    BassSwap,
}

impl CurveKind {
    pub fn build(self) -> Box<dyn TransitionCurve> {
        match self {
            Self::Flat => Box::new(Flat),
            Self::FilterSweep { depth } => Box::new(FilterSweep::new(depth)),
            Self::BassSwap => Box::new(BassSwap),
        }
    }
}

/// No secondary effect
#[derive(Debug, Default, Clone, Copy)]
pub struct Flat;

impl TransitionCurve for Flat {
    fn tick(&mut self, _: &dyn ControlEngine, _: Channel, _: Channel, _: f64) {}

    fn clean(&mut self, _: &dyn ControlEngine, _: Channel, _: Channel) {}
}

const FILTER_NEUTRAL: f64 = 0.5;

/// Sweep the outgoing deck toward high-pass while the incoming deck opens up
/// from low-pass
#[derive(Debug, Clone, Copy)]
pub struct FilterSweep {
    depth: f64,
}

impl FilterSweep {
    /// `depth` is the maximum knob travel away from neutral (0.0-0.5)
    pub fn new(depth: f64) -> Self {
        Self {
            depth: depth.clamp(0.0, FILTER_NEUTRAL),
        }
    }
}

impl TransitionCurve for FilterSweep {
    fn tick(&mut self, engine: &dyn ControlEngine, prev: Channel, next: Channel, progress: f64) {
        let p = progress.clamp(0.0, 1.0);
        engine.set_value(
            Group::QuickEffect(prev),
            ControlKey::Super1,
            FILTER_NEUTRAL + self.depth * p,
        );
        engine.set_value(
            Group::QuickEffect(next),
            ControlKey::Super1,
            FILTER_NEUTRAL - self.depth * (1.0 - p),
        );
    }

    fn clean(&mut self, engine: &dyn ControlEngine, prev: Channel, next: Channel) {
        for ch in [prev, next] {
            engine.set_value(Group::QuickEffect(ch), ControlKey::Super1, FILTER_NEUTRAL);
        }
    }
}

const EQ_FLAT: f64 = 1.0;
const EQ_KILL: f64 = 0.0;

/// Only one deck carries the bass at a time
#[derive(Debug, Default, Clone, Copy)]
pub struct BassSwap;

impl TransitionCurve for BassSwap {
    fn tick(&mut self, engine: &dyn ControlEngine, prev: Channel, next: Channel, progress: f64) {
        let (prev_low, next_low) = if progress < 0.5 {
            (EQ_FLAT, EQ_KILL)
        } else {
            (EQ_KILL, EQ_FLAT)
        };
        engine.set_value(Group::Equalizer(prev), ControlKey::Parameter1, prev_low);
        engine.set_value(Group::Equalizer(next), ControlKey::Parameter1, next_low);
    }

    fn clean(&mut self, engine: &dyn ControlEngine, prev: Channel, next: Channel) {
        for ch in [prev, next] {
            engine.set_value(Group::Equalizer(ch), ControlKey::Parameter1, EQ_FLAT);
        }
    }
}
