//! Control namespace of the mixing engine
//!
//! Everything the core does goes through named control values. A control is
//! addressed by a [`Group`] (a deck, the master section, an effect rack slot)
//! and a [`ControlKey`]. The engine itself is an external collaborator reached
//! through the [`ControlEngine`] trait.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Deck channel identifier (1-based, `[Channel1]` .. `[Channel4]`)
///
/// A plain value: copying it never aliases any state, so swapping the
/// automix roles only swaps two numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(u8);

impl Channel {
    /// Create a channel handle from its deck number
    pub const fn new(number: u8) -> Self {
        Self(number)
    }

    /// Deck number as shown on the surface
    pub fn number(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Channel{}]", self.0)
    }
}

/// Control group (the part of the engine a key lives in)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "channel", rename_all = "snake_case")]
pub enum Group {
    /// Per-deck transport and mixer controls
    Channel(Channel),
    /// Master section (crossfader)
    Master,
    /// Library/playlist triggers
    Playlist,
    /// Quick effect rack attached to a deck
    QuickEffect(Channel),
    /// Equalizer rack attached to a deck
    Equalizer(Channel),
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(ch) => write!(f, "{}", ch),
            Self::Master => write!(f, "[Master]"),
            Self::Playlist => write!(f, "[Playlist]"),
            Self::QuickEffect(ch) => write!(f, "[QuickEffectRack1_{}]", ch),
            Self::Equalizer(ch) => write!(f, "[EqualizerRack1_{}_Effect1]", ch),
        }
    }
}

impl From<Channel> for Group {
    fn from(channel: Channel) -> Self {
        Self::Channel(channel)
    }
}

/// Named control value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKey {
    Play,
    PlayIndicator,
    TrackLoaded,
    SyncMode,
    SyncEnabled,
    Volume,
    Rate,
    Bpm,
    FileBpm,
    TrackSamples,
    TrackSamplerate,
    Playposition,
    Duration,
    OutroStartPosition,
    OutroEndPosition,
    IntroStartPosition,
    IntroEndPosition,
    LoopEnabled,
    LoopStartPosition,
    LoopEndPosition,
    ReloopToggle,
    BeatsyncPhase,
    BeatsyncTempo,
    Eject,
    /// Shift the current loop 16 beats backwards
    LoopMove16Backward,
    /// `[Master]` crossfader, -1.0 (left) .. 1.0 (right)
    Crossfader,
    /// `[Playlist]` trigger loading the selected track into the first stopped deck
    LoadSelectedIntoFirstStopped,
    /// Quick effect meta knob, 0.5 is bypass
    Super1,
    /// Equalizer low band gain, 1.0 is flat
    Parameter1,
}

impl ControlKey {
    /// Engine-side control name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::PlayIndicator => "play_indicator",
            Self::TrackLoaded => "track_loaded",
            Self::SyncMode => "sync_mode",
            Self::SyncEnabled => "sync_enabled",
            Self::Volume => "volume",
            Self::Rate => "rate",
            Self::Bpm => "bpm",
            Self::FileBpm => "file_bpm",
            Self::TrackSamples => "track_samples",
            Self::TrackSamplerate => "track_samplerate",
            Self::Playposition => "playposition",
            Self::Duration => "duration",
            Self::OutroStartPosition => "outro_start_position",
            Self::OutroEndPosition => "outro_end_position",
            Self::IntroStartPosition => "intro_start_position",
            Self::IntroEndPosition => "intro_end_position",
            Self::LoopEnabled => "loop_enabled",
            Self::LoopStartPosition => "loop_start_position",
            Self::LoopEndPosition => "loop_end_position",
            Self::ReloopToggle => "reloop_toggle",
            Self::BeatsyncPhase => "beatsync_phase",
            Self::BeatsyncTempo => "beatsync_tempo",
            Self::Eject => "eject",
            Self::LoopMove16Backward => "loop_move_16_backward",
            Self::Crossfader => "crossfader",
            Self::LoadSelectedIntoFirstStopped => "LoadSelectedIntoFirstStopped",
            Self::Super1 => "super1",
            Self::Parameter1 => "parameter1",
        }
    }
}

impl fmt::Display for ControlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `sync_mode` values
pub mod sync_mode {
    pub const NONE: f64 = 0.0;
    pub const FOLLOWER: f64 = 1.0;
    pub const LEADER: f64 = 2.0;
}

/// Handle returned by [`ControlEngine::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(pub u64);

/// Callback invoked with the control's value
pub type ControlHandler = Box<dyn FnMut(f64)>;

/// The mixing engine as seen by the core
///
/// All methods take `&self`: writes are fire-and-forget requests to the
/// engine, exactly like the host's scripting object. Implementations that keep
/// local state use interior mutability. Everything runs on one thread.
pub trait ControlEngine {
    /// Read a control value
    fn get_value(&self, group: Group, key: ControlKey) -> f64;

    /// Write a control value
    fn set_value(&self, group: Group, key: ControlKey, value: f64);

    /// Watch a control
    ///
    /// The handler is called once immediately with the current value, then on
    /// every change. Handlers must not call back into the engine.
    fn subscribe(
        &self,
        group: Group,
        key: ControlKey,
        handler: ControlHandler,
    ) -> SubscriptionToken;

    /// Stop watching a control (unknown tokens are ignored)
    fn unsubscribe(&self, token: SubscriptionToken);

    /// Ignore the next manual write to this control if it disagrees with the
    /// engine's value
    fn suppress_next_external_write(&self, group: Group, key: ControlKey);

    /// Enable or release soft takeover on a manually drivable control
    fn set_soft_takeover(&self, group: Group, key: ControlKey, enabled: bool);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_names() {
        let ch = Channel::new(2);
        assert_eq!(Group::Channel(ch).to_string(), "[Channel2]");
        assert_eq!(Group::QuickEffect(ch).to_string(), "[QuickEffectRack1_[Channel2]]");
        assert_eq!(Group::Equalizer(ch).to_string(), "[EqualizerRack1_[Channel2]_Effect1]");
        assert_eq!(Group::Master.to_string(), "[Master]");
    }

    #[test]
    fn test_key_names() {
        assert_eq!(ControlKey::OutroStartPosition.as_str(), "outro_start_position");
        assert_eq!(ControlKey::LoopMove16Backward.to_string(), "loop_move_16_backward");
    }

    #[test]
    fn test_key_serde_matches_engine_name() {
        let yaml = serde_yaml::to_string(&ControlKey::PlayIndicator).unwrap();
        assert_eq!(yaml.trim(), "play_indicator");
        let group: Group = serde_yaml::from_str("type: channel\nchannel: 3\n").unwrap();
        assert_eq!(group, Group::Channel(Channel::new(3)));
    }
}
