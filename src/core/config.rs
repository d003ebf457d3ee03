//! Global configuration for the client

use std::sync::atomic::{AtomicBool, Ordering};

/// Set once at startup from `-d/--debug`; read by the logging macros.
pub static DEBUG: AtomicBool = AtomicBool::new(false);

/// Check if debug logging is enabled
#[inline]
pub fn is_debug() -> bool {
    DEBUG.load(Ordering::Relaxed)
}
