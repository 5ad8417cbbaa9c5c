//! Deck accessor and time-unit conversions
//!
//! Positions come from the engine in three units: normalized play position
//! (0.0-1.0 of the track), seconds, and samples. The sample counters count
//! individual stereo samples, hence the factor of 2 against sample-frames.
//! Beats are derived from the deck's current (rate-adjusted) bpm.

use crate::control::{Channel, ControlEngine, ControlKey, Group};

/// Stateless view of one deck's controls
#[derive(Clone, Copy)]
pub struct DeckRef<'a> {
    engine: &'a dyn ControlEngine,
    channel: Channel,
}

impl<'a> DeckRef<'a> {
    pub fn new(engine: &'a dyn ControlEngine, channel: Channel) -> Self {
        Self { engine, channel }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn get(&self, key: ControlKey) -> f64 {
        self.engine.get_value(Group::Channel(self.channel), key)
    }

    pub fn set(&self, key: ControlKey, value: f64) {
        self.engine.set_value(Group::Channel(self.channel), key, value);
    }

    /// Write the logical complement of the current value
    pub fn toggle(&self, key: ControlKey) {
        let value = if self.get(key) != 0.0 { 0.0 } else { 1.0 };
        self.set(key, value);
    }

    /// Press and release a button control
    pub fn pulse(&self, key: ControlKey) {
        self.set(key, 1.0);
        self.set(key, 0.0);
    }

    /// Request that the next manual write to `key` is ignored
    pub fn suppress_next_external_write(&self, key: ControlKey) {
        self.engine
            .suppress_next_external_write(Group::Channel(self.channel), key);
    }

    pub fn set_soft_takeover(&self, key: ControlKey, enabled: bool) {
        self.engine
            .set_soft_takeover(Group::Channel(self.channel), key, enabled);
    }

    pub fn is_playing(&self) -> bool {
        self.get(ControlKey::Play) != 0.0
    }

    pub fn has_track(&self) -> bool {
        self.get(ControlKey::TrackLoaded) != 0.0
    }

    /// Whether the deck holds any sync role
    pub fn is_synced(&self) -> bool {
        self.get(ControlKey::SyncMode) != 0.0 || self.get(ControlKey::SyncEnabled) != 0.0
    }

    pub fn bpm(&self) -> f64 {
        self.get(ControlKey::Bpm)
    }

    /// Unmodified track tempo
    pub fn file_bpm(&self) -> f64 {
        self.get(ControlKey::FileBpm)
    }

    pub fn sample_rate(&self) -> f64 {
        self.get(ControlKey::TrackSamplerate)
    }

    pub fn duration_seconds(&self) -> f64 {
        self.get(ControlKey::Duration)
    }

    /// Cue point in samples, `None` when unset (negative)
    pub fn cue_samples(&self, key: ControlKey) -> Option<f64> {
        let samples = self.get(key);
        (samples >= 0.0).then_some(samples)
    }

    pub fn samples_to_seconds(&self, samples: f64) -> f64 {
        samples / self.sample_rate() / 2.0
    }

    pub fn seconds_to_beats(&self, seconds: f64) -> f64 {
        seconds * self.bpm() / 60.0
    }

    pub fn samples_to_beats(&self, samples: f64) -> f64 {
        self.seconds_to_beats(self.samples_to_seconds(samples))
    }

    /// Beat offset to normalized play position
    pub fn beats_to_pos(&self, beats: f64) -> f64 {
        beats / self.bpm() * 60.0 / self.duration_seconds()
    }

    pub fn beats_to_samples(&self, beats: f64) -> f64 {
        beats / self.bpm() * 60.0 * 2.0 * self.sample_rate()
    }

    pub fn current_position_beats(&self) -> f64 {
        self.seconds_to_beats(self.get(ControlKey::Playposition) * self.duration_seconds())
    }

    /// Beats from the playhead to a cue point (negative once passed)
    pub fn beats_till_cue(&self, key: ControlKey) -> f64 {
        self.samples_to_beats(self.get(key)) - self.current_position_beats()
    }

    /// Seek to an absolute beat position
    pub fn seek_beats(&self, beats: f64) {
        self.set(ControlKey::Playposition, self.beats_to_pos(beats));
    }

    /// Move the playhead by a number of beats
    pub fn nudge_beats(&self, delta: f64) {
        self.seek_beats(self.current_position_beats() + delta);
    }

    /// Re-enter the stored loop
    ///
    /// Does nothing if the loop is off and the playhead is already past its
    /// end; toggling then would jump backwards into the loop.
    pub fn reloop(&self) {
        let position_samples =
            self.get(ControlKey::Playposition) * self.get(ControlKey::TrackSamples);
        if self.get(ControlKey::LoopEnabled) == 0.0
            && position_samples > self.get(ControlKey::LoopEndPosition)
        {
            log::debug!("{}: playhead past loop end, not relooping", self.channel);
            return;
        }
        self.pulse(ControlKey::ReloopToggle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryEngine;

    fn setup(engine: &MemoryEngine) -> DeckRef<'_> {
        let deck = DeckRef::new(engine, Channel::new(1));
        deck.set(ControlKey::Bpm, 120.0);
        deck.set(ControlKey::TrackSamplerate, 44_100.0);
        deck.set(ControlKey::Duration, 240.0);
        deck.set(ControlKey::TrackSamples, 240.0 * 44_100.0 * 2.0);
        deck
    }

    #[test]
    fn test_toggle() {
        let engine = MemoryEngine::new();
        let deck = DeckRef::new(&engine, Channel::new(1));
        deck.set(ControlKey::Play, 0.7);
        deck.toggle(ControlKey::Play);
        assert_eq!(deck.get(ControlKey::Play), 0.0);
        deck.toggle(ControlKey::Play);
        assert_eq!(deck.get(ControlKey::Play), 1.0);
    }

    #[test]
    fn test_conversions() {
        let engine = MemoryEngine::new();
        let deck = setup(&engine);

        // One second of stereo samples at 44.1k
        assert!((deck.samples_to_seconds(88_200.0) - 1.0).abs() < 1e-12);
        assert!((deck.seconds_to_beats(30.0) - 60.0).abs() < 1e-12);
        assert!((deck.samples_to_beats(88_200.0) - 2.0).abs() < 1e-12);
        assert!((deck.beats_to_samples(2.0) - 88_200.0).abs() < 1e-9);
        // 120 beats = 60 s = quarter of a 240 s track
        assert!((deck.beats_to_pos(120.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_position_and_cues() {
        let engine = MemoryEngine::new();
        let deck = setup(&engine);
        deck.set(ControlKey::Playposition, 0.25);
        assert!((deck.current_position_beats() - 120.0).abs() < 1e-9);

        // Cue 64 beats in = 32 s
        deck.set(ControlKey::IntroEndPosition, 32.0 * 88_200.0);
        assert!((deck.beats_till_cue(ControlKey::IntroEndPosition) + 56.0).abs() < 1e-9);

        deck.set(ControlKey::OutroStartPosition, -1.0);
        assert_eq!(deck.cue_samples(ControlKey::OutroStartPosition), None);
        assert_eq!(deck.cue_samples(ControlKey::IntroEndPosition), Some(32.0 * 88_200.0));
    }

    #[test]
    fn test_nudge() {
        let engine = MemoryEngine::new();
        let deck = setup(&engine);
        deck.seek_beats(100.0);
        deck.nudge_beats(7.0);
        assert!((deck.current_position_beats() - 107.0).abs() < 1e-9);
    }

    #[test]
    fn test_reloop_guard() {
        let engine = MemoryEngine::new();
        let deck = setup(&engine);
        deck.set(ControlKey::LoopEndPosition, 1000.0);
        deck.set(ControlKey::Playposition, 0.5);
        engine.take_writes();

        deck.reloop();
        assert!(engine.take_writes().is_empty());

        deck.set(ControlKey::LoopEnabled, 1.0);
        engine.take_writes();
        deck.reloop();
        let writes = engine.take_writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].1, ControlKey::ReloopToggle);
    }
}
