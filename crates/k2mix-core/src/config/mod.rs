//! Automation configuration
//!
//! Stored as YAML, by default at `<config dir>/k2mix/automix.yaml`. Every
//! field has a default, so a partial file only overrides what it names.

mod io;
mod paths;

pub use io::{load_config, save_config};
pub use paths::{default_config_dir, default_config_path};

use crate::control::Channel;
use crate::curve::CurveKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fader level from which a deck counts as audible
pub const DEFAULT_AUDIBLE_VOLUME: f64 = 0.05;

/// File name of the automation config
pub const AUTOMIX_CONFIG_FILE: &str = "automix.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomixConfig {
    /// Interval of the tick driving the automixer and beat aligner
    pub fast_tick_ms: u64,
    /// Interval of the tick driving rate zeroing and LED refresh
    pub slow_tick_ms: u64,
    /// Largest tempo gap (bpm) still mixed with a synced long transition
    pub long_mix_max_bpm_diff: f64,
    /// Half length of a long transition, in seconds of the incoming track
    pub transition_half_seconds: f64,
    /// Rate change per slow tick while zeroing
    pub rate_zero_step: f64,
    /// Fader level from which a deck counts as audible
    pub audible_volume: f64,
    /// Secondary effect during long transitions
    pub curve: CurveKind,
    /// Start beat alignment when a track lands on a deck with sync enabled
    pub align_on_load: bool,
    /// The two decks the automixer hands over between
    pub automix_decks: [Channel; 2],
    /// Every deck on the surface, candidates for beat alignment
    pub decks: Vec<Channel>,
}

impl Default for AutomixConfig {
    fn default() -> Self {
        Self {
            fast_tick_ms: 50,
            slow_tick_ms: 100,
            long_mix_max_bpm_diff: 8.0,
            transition_half_seconds: 5.0,
            rate_zero_step: crate::rate_zero::RATE_STEP,
            audible_volume: DEFAULT_AUDIBLE_VOLUME,
            curve: CurveKind::default(),
            align_on_load: false,
            automix_decks: [Channel::new(1), Channel::new(2)],
            decks: vec![Channel::new(1), Channel::new(2), Channel::new(3)],
        }
    }
}

impl AutomixConfig {
    /// Load from `path`, or from the default location
    pub fn load(path: Option<&Path>) -> Self {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_config_path(AUTOMIX_CONFIG_FILE));
        load_config(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: AutomixConfig = serde_yaml::from_str(
            "curve:\n  type: filter_sweep\n  depth: 0.3\nautomix_decks: [1, 3]\n",
        )
        .unwrap();
        assert_eq!(config.curve, CurveKind::FilterSweep { depth: 0.3 });
        assert_eq!(config.automix_decks, [Channel::new(1), Channel::new(3)]);
        assert_eq!(config.long_mix_max_bpm_diff, 8.0);
        assert_eq!(config.rate_zero_step, 0.005);
    }
}
