//! Deck automation for a Xone K2 driven DJ engine
//!
//! This crate provides:
//! - A typed view of the engine's control namespace ([`ControlEngine`])
//! - Deck accessors and time-unit conversions ([`DeckRef`])
//! - The automixer phase machine and its transition curves
//! - The beat aligner that drops a stopped deck in phrase with the playing one
//! - The rate zeroer that walks a tempo offset back to zero
//! - YAML configuration with defaults
//!
//! # Ticks
//!
//! Nothing here owns a thread or a timer. The host calls
//! [`AutoMixer::tick`] on the fast tick (50 ms by default) and
//! [`RateZeroer::tick`] on the slow tick (100 ms); every decision is made
//! from the control values read during that call.

pub mod aligner;
pub mod automix;
pub mod config;
pub mod control;
pub mod curve;
pub mod deck;
pub mod error;
pub mod led;
pub mod memory;
pub mod rate_zero;

pub use aligner::BeatAligner;
pub use automix::{AutoMixer, Phase, TransitionPoints};
pub use config::{load_config, save_config, AutomixConfig};
pub use control::{Channel, ControlEngine, ControlHandler, ControlKey, Group, SubscriptionToken};
pub use curve::{CurveKind, TransitionCurve};
pub use deck::DeckRef;
pub use error::Refusal;
pub use led::LedColor;
pub use memory::MemoryEngine;
pub use rate_zero::RateZeroer;
