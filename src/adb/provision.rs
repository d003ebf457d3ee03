//! Capture app provisioning
//!
//! Brings the device-side app to a running, reachable state: install,
//! audio-capture grant, port forward, activity launch, then a bounded
//! wait for the notification-listener grant that backs track metadata.

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};

use crate::adb::Adb;
use crate::{log_debug, log_info, log_warn};

/// Device-side application identity.
pub const PACKAGE: &str = "com.rom1v.sndcpy";
pub const ACTIVITY: &str = "com.rom1v.sndcpy/.MainActivity";
/// Abstract socket the app listens on.
pub const SOCKET_NAME: &str = "sndcpy";

/// Service the app runs once audio capture is underway.
const RECORD_SERVICE: &str = "RecordService";

const STARTUP_PAUSE: Duration = Duration::from_secs(1);
const POLL_INTERVAL: Duration = Duration::from_secs(2);
const POLL_CEILING: Duration = Duration::from_secs(30);

/// Forward-only provisioning progress; there is no rollback path.
/// `MetadataUnavailable` is a valid terminal state - streaming proceeds
/// without track metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionState {
    NotInstalled,
    Installed,
    PermissionRequested,
    PortForwarded,
    Launched,
    MetadataReady,
    MetadataUnavailable,
}

/// Outcome of one provisioning pass.
#[derive(Debug)]
pub struct Provisioned {
    pub state: ProvisionState,
    pub installed: bool,
    pub permission_granted: bool,
    pub port_forwarded: bool,
    pub app_started: bool,
    pub metadata_capable: bool,
}

impl Provisioned {
    fn advance(&mut self, next: ProvisionState) {
        log_debug!("APP", "{:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Run the full provisioning sequence against one device.
///
/// Installation failures are fatal; the permission grant, port forward
/// and activity launch are best-effort - a failure there surfaces later
/// as a connection error rather than here.
pub fn provision(adb: &Adb, apk_path: &Path, port: u16) -> Result<Provisioned> {
    let mut report = Provisioned {
        state: ProvisionState::NotInstalled,
        installed: false,
        permission_granted: false,
        port_forwarded: false,
        app_started: false,
        metadata_capable: false,
    };

    ensure_installed(adb, apk_path)?;
    report.installed = true;
    report.advance(ProvisionState::Installed);

    report.permission_granted = grant_capture_permission(adb);
    report.advance(ProvisionState::PermissionRequested);

    report.port_forwarded = forward_port(adb, port);
    report.advance(ProvisionState::PortForwarded);

    report.app_started = launch(adb);
    report.advance(ProvisionState::Launched);

    log_debug!("APP", "Waiting {:?} for app startup...", STARTUP_PAUSE);
    thread::sleep(STARTUP_PAUSE);

    report.metadata_capable = await_metadata(adb);
    report.advance(if report.metadata_capable {
        ProvisionState::MetadataReady
    } else {
        ProvisionState::MetadataUnavailable
    });

    Ok(report)
}

/// Install the capture app unless it is already present; repeated runs
/// perform no redundant install.
fn ensure_installed(adb: &Adb, apk_path: &Path) -> Result<()> {
    if !apk_path.exists() {
        bail!(
            "APK not found: {}\nDownload sndcpy.apk from https://github.com/rom1v/sndcpy/releases/",
            apk_path.display()
        );
    }

    if adb.list_package(PACKAGE)? {
        log_info!("APP", "App already installed");
        return Ok(());
    }

    log_info!("APP", "Installing {}...", apk_path.display());
    let output = adb.install(&apk_path.to_string_lossy())?;
    if !output.success {
        bail!("installation failed: {}", output.stderr.trim());
    }
    log_debug!("APP", "Install output: {}", output.stdout.trim());
    Ok(())
}

/// Best-effort: some platform versions neither support nor need the
/// appops grant.
fn grant_capture_permission(adb: &Adb) -> bool {
    log_info!("APP", "Granting audio capture permission...");
    match adb.grant_media_projection(PACKAGE) {
        Ok(output) if output.success => true,
        Ok(output) => {
            log_warn!("APP", "Permission grant failed: {}", output.stderr.trim());
            false
        }
        Err(e) => {
            log_warn!("APP", "Permission grant failed: {:#}", e);
            false
        }
    }
}

/// Best-effort: a failed forward shows up as a connection failure once
/// the client tries to attach.
fn forward_port(adb: &Adb, port: u16) -> bool {
    log_info!("APP", "Forwarding port {}...", port);
    match adb.forward(port, SOCKET_NAME) {
        Ok(output) if output.success => true,
        Ok(output) => {
            log_warn!("APP", "Port forward failed: {}", output.stderr.trim());
            false
        }
        Err(e) => {
            log_warn!("APP", "Port forward failed: {:#}", e);
            false
        }
    }
}

/// Best-effort, same rationale as the forward.
fn launch(adb: &Adb) -> bool {
    log_info!("APP", "Starting app...");
    match adb.start_activity(ACTIVITY) {
        Ok(output) if output.success => true,
        Ok(output) => {
            log_warn!("APP", "App launch failed: {}", output.stderr.trim());
            false
        }
        Err(e) => {
            log_warn!("APP", "App launch failed: {:#}", e);
            false
        }
    }
}

/// Wait for the notification-listener grant used by track metadata.
///
/// The grant and the app's record service are probed independently;
/// observing either is enough. Running out of time only disables
/// metadata - streaming still proceeds.
fn await_metadata(adb: &Adb) -> bool {
    log_info!("APP", "Checking notification permission...");
    if listener_granted(adb) {
        log_info!("APP", "Notification permission already granted");
        return true;
    }

    log_info!(
        "APP",
        "Waiting up to {}s for notification permission...",
        POLL_CEILING.as_secs()
    );
    log_info!("APP", "Grant the permission on the device when prompted");
    let permission_seen = poll(|| listener_granted(adb));
    if permission_seen {
        log_info!("APP", "Notification permission granted");
    }

    log_info!("APP", "Waiting for the capture service to start...");
    let service_seen = poll(|| service_running(adb));
    if service_seen {
        log_info!("APP", "Capture service detected");
    }

    if !(permission_seen || service_seen) {
        log_warn!(
            "APP",
            "Timed out waiting for permission; metadata features disabled"
        );
    }
    permission_seen || service_seen
}

/// Probe at a fixed interval until `check` succeeds or the ceiling
/// elapses.
fn poll(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + POLL_CEILING;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(POLL_INTERVAL);
    }
    false
}

fn listener_granted(adb: &Adb) -> bool {
    adb.notification_listeners()
        .map(|listeners| listeners.contains(PACKAGE))
        .unwrap_or(false)
}

fn service_running(adb: &Adb) -> bool {
    adb.running_services(PACKAGE)
        .map(|services| services.contains(RECORD_SERVICE))
        .unwrap_or(false)
}
