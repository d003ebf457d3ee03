//! Audio output module
//!
//! Plays the device's raw PCM stream through the default output device
//! via cpal.

mod playback;

pub use playback::{AudioSink, SinkWriter, CHANNELS, SAMPLE_RATE};
