//! discolink: two-node disco lights and sound over MQTT.
//!
//! A Controller (knob, button, small strip, display) picks a song and a
//! lighting mode; a Renderer (large strip, speaker) follows along. All
//! hardware and transport sit behind traits so both nodes run unchanged on
//! test doubles.

pub mod animation;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod connection;
pub mod error;
pub mod hal;
pub mod input;
pub mod link;
pub mod node;
pub mod playback;
pub mod reconnect;
pub mod router;
pub mod state;

pub use error::{DiscoError, Result};
