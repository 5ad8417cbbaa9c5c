//! Controller profile
//!
//! Describes how the K2 surface is laid out: which buttons switch modes,
//! what each button does per mode, and which LEDs follow which controls.
//! Stored as YAML next to the automation config.

use crate::layer::{LedBinding, ModeBindings};
use crate::led::{ColorNoteOffsets, LedColor};
use crate::types::{letter_note, MidiAddress, DEFAULT_MIDI_CHANNEL, LAYER_BUTTON};
use k2mix_core::config::{default_config_path, load_config};
use k2mix_core::{Channel, ControlKey, Group};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the controller profile
pub const CONTROLLER_CONFIG_FILE: &str = "controller.yaml";

/// What a button press does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    ToggleAutomix,
    ZeroRate { channel: Channel },
    AlignAndSetLoop { channel: Channel },
    Reloop { channel: Channel },
    NextMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonBinding {
    pub note: u8,
    #[serde(flatten)]
    pub action: Action,
}

/// One controller layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeConfig {
    pub name: String,
    /// Colour of the mode button while this mode is active
    #[serde(default)]
    pub indicator: LedColor,
    #[serde(default)]
    pub buttons: Vec<ButtonBinding>,
    #[serde(default)]
    pub leds: Vec<LedBinding>,
}

impl ModeConfig {
    pub fn action_for(&self, note: u8) -> Option<Action> {
        self.buttons.iter().find(|b| b.note == note).map(|b| b.action)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerProfile {
    pub name: String,
    /// MIDI channel the controller sends and listens on (0-15)
    pub midi_channel: u8,
    pub color_note_offsets: ColorNoteOffsets,
    /// Cycles through `modes`
    pub mode_button: u8,
    /// Toggles the automixer in every mode; its LED shows the automix phase
    pub automix_button: u8,
    /// First entry is active at start
    pub modes: Vec<ModeConfig>,
}

impl Default for ControllerProfile {
    fn default() -> Self {
        Self {
            name: "Xone K2".to_string(),
            midi_channel: DEFAULT_MIDI_CHANNEL,
            color_note_offsets: ColorNoteOffsets::default(),
            mode_button: LAYER_BUTTON,
            automix_button: note('p'),
            modes: vec![deck_mode(Channel::new(1)), overview_mode()],
        }
    }
}

impl ControllerProfile {
    /// Load from `path`, or from the default location
    pub fn load(path: Option<&Path>) -> Self {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_controller_config_path);
        load_config(&path)
    }

    pub fn address(&self, note: u8) -> MidiAddress {
        MidiAddress::note(self.midi_channel, note)
    }

    /// Subscription bindings for every mode, in order
    pub fn mode_bindings(&self) -> Vec<ModeBindings> {
        self.modes
            .iter()
            .map(|mode| ModeBindings::new(mode.name.clone(), self.midi_channel, mode.leds.clone()))
            .collect()
    }
}

pub fn default_controller_config_path() -> PathBuf {
    default_config_path(CONTROLLER_CONFIG_FILE)
}

fn note(letter: char) -> u8 {
    letter_note(letter).unwrap_or_default()
}

/// Single deck on the whole surface
fn deck_mode(channel: Channel) -> ModeConfig {
    let deck = Group::Channel(channel);
    ModeConfig {
        name: "deck".to_string(),
        indicator: LedColor::Off,
        buttons: vec![
            ButtonBinding {
                note: note('a'),
                action: Action::Reloop { channel },
            },
            ButtonBinding {
                note: note('e'),
                action: Action::ZeroRate { channel },
            },
            ButtonBinding {
                note: note('i'),
                action: Action::AlignAndSetLoop { channel },
            },
        ],
        leds: vec![
            LedBinding {
                group: deck,
                key: ControlKey::LoopEnabled,
                note: note('a'),
                on: LedColor::Green,
                off: LedColor::Off,
            },
            LedBinding {
                group: deck,
                key: ControlKey::PlayIndicator,
                note: note('i'),
                on: LedColor::Green,
                off: LedColor::Amber,
            },
        ],
    }
}

/// One column per deck: reloop, zero rate, align
fn overview_mode() -> ModeConfig {
    let columns = [
        (Channel::new(3), ['a', 'e', 'i']),
        (Channel::new(1), ['b', 'f', 'j']),
        (Channel::new(2), ['c', 'g', 'k']),
    ];
    let mut buttons = Vec::new();
    let mut leds = Vec::new();
    for (channel, [reloop, zero, align]) in columns {
        buttons.push(ButtonBinding {
            note: note(reloop),
            action: Action::Reloop { channel },
        });
        buttons.push(ButtonBinding {
            note: note(zero),
            action: Action::ZeroRate { channel },
        });
        buttons.push(ButtonBinding {
            note: note(align),
            action: Action::AlignAndSetLoop { channel },
        });
        leds.push(LedBinding {
            group: Group::Channel(channel),
            key: ControlKey::LoopEnabled,
            note: note(reloop),
            on: LedColor::Green,
            off: LedColor::Off,
        });
    }
    ModeConfig {
        name: "overview".to_string(),
        indicator: LedColor::Amber,
        buttons,
        leds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k2mix_core::save_config;
    use tempfile::TempDir;

    #[test]
    fn test_default_layout() {
        let profile = ControllerProfile::default();
        assert_eq!(profile.midi_channel, 14);
        assert_eq!(profile.modes[0].name, "deck");
        let overview = &profile.modes[1];
        assert_eq!(
            overview.action_for(0x25),
            Some(Action::Reloop {
                channel: Channel::new(1)
            })
        );
        assert_eq!(
            overview.action_for(0x20),
            Some(Action::ZeroRate {
                channel: Channel::new(3)
            })
        );
        assert_eq!(
            overview.action_for(0x1E),
            Some(Action::AlignAndSetLoop {
                channel: Channel::new(2)
            })
        );
        assert_eq!(overview.action_for(0x1B), None);
    }

    #[test]
    fn test_button_binding_yaml() {
        let binding: ButtonBinding =
            serde_yaml::from_str("note: 32\naction: zero_rate\nchannel: 2\n").unwrap();
        assert_eq!(
            binding.action,
            Action::ZeroRate {
                channel: Channel::new(2)
            }
        );
        let toggle: ButtonBinding =
            serde_yaml::from_str("note: 27\naction: toggle_automix\n").unwrap();
        assert_eq!(toggle.action, Action::ToggleAutomix);
    }

    #[test]
    fn test_profile_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONTROLLER_CONFIG_FILE);
        let mut profile = ControllerProfile::default();
        profile.midi_channel = 3;
        save_config(&profile, &path).unwrap();

        assert_eq!(ControllerProfile::load(Some(&path)), profile);
    }

    #[test]
    fn test_partial_profile_keeps_default_modes() {
        let profile: ControllerProfile = serde_yaml::from_str("midi_channel: 2\n").unwrap();
        assert_eq!(profile.midi_channel, 2);
        assert_eq!(profile.modes.len(), 2);
        assert_eq!(profile.address(0x24), MidiAddress::note(2, 0x24));
    }
}
