//! Device bridge module
//!
//! Drives the adb binary: environment checks, capture-app provisioning,
//! and the port forward that exposes the device's audio socket locally.

mod device;
mod provision;
mod runner;

pub use device::{check_adb, Adb};
pub use provision::{provision, ProvisionState, Provisioned, ACTIVITY, PACKAGE, SOCKET_NAME};
pub use runner::{CommandRunner, SystemRunner, ToolOutput};
