//! Xone K2 controller glue for k2mix
//!
//! This crate provides:
//! - MIDI press parsing via midly, queued over flume
//! - Note-offset LED feedback (red/amber/green layers) with change tracking
//! - Mode layers whose LEDs follow engine controls through subscriptions
//! - A controller profile loaded from YAML
//! - [`ControllerSession`], which owns the automation and drives both ticks
//!
//! # Architecture
//!
//! ```text
//! MIDI device → callback → PressSender → flume → ControllerSession::fast_tick()
//!                                                   ├─ AutoMixer / BeatAligner
//!                                                   └─ LedSink ← mode subscriptions
//! ```
//!
//! The MIDI callback only parses and queues. Every action runs on the thread
//! that calls [`ControllerSession::poll`].

mod config;
mod input;
mod layer;
mod led;
mod session;
mod types;

pub use config::{
    default_controller_config_path, Action, ButtonBinding, ControllerProfile, ModeConfig,
    CONTROLLER_CONFIG_FILE,
};
pub use input::{parse_press, press_queue, PressSender};
pub use layer::{LedBinding, LedUpdate, ModeBindings};
pub use led::{
    transition_messages, ColorNoteOffsets, LedChangeTracker, LedColor, LedSink, MidiLedSink,
};
pub use session::{ControllerSession, DueTicks, Ticker};
pub use types::{letter_note, ButtonPress, MidiAddress, DEFAULT_MIDI_CHANNEL, LAYER_BUTTON};
