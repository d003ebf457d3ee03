//! Core module - configuration, logging, session lifecycle

mod config;
#[macro_use]
pub mod logger;
mod session;

pub use config::{is_debug, DEBUG};
pub use session::SessionResources;
