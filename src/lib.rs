//! Desktop client for streaming Android system audio
//!
//! Provisions the on-device capture app over adb, forwards its abstract
//! socket to a local TCP port, and plays the raw PCM stream on the
//! default audio output.

#[macro_use]
pub mod core;
pub mod adb;
pub mod audio;
pub mod network;

// Re-export commonly used items
pub use self::adb::Adb;
pub use self::audio::AudioSink;
pub use self::core::SessionResources;
