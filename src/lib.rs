// src/lib.rs
//! Hand-gesture control for a multi-stem music player.
//!
//! A [`tracking::GestureTracker`] consumes per-frame hand landmarks and turns
//! them into [`events::ControlEvent`]s: play/pause from the right hand's pose,
//! per-zone volume from a pinch drag, track navigation from a horizontal
//! swipe and a signed playback rate from a rotating shaka.

pub mod config;
pub mod data;
pub mod events;
pub mod landmarks;
pub mod mixer;
pub mod pinch;
pub mod pose;
pub mod runner;
pub mod smoothing;
pub mod source;
pub mod swipe;
pub mod synthetic;
pub mod tracking;
pub mod yaw_jog;
pub mod zone;

pub use config::GestureConfig;
pub use events::{ControlEvent, EventSink, StampedEvent};
pub use tracking::GestureTracker;
