//! Device bridge handle and environment checks

use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};

use crate::adb::runner::{CommandRunner, ToolOutput};
use crate::{log_debug, log_info};

const ADB: &str = "adb";

/// Verify the adb binary is invocable. The version string only shows up
/// in debug output.
pub fn check_adb(runner: &dyn CommandRunner) -> Result<()> {
    log_info!("ADB", "Checking adb installation...");
    match runner.run(ADB, &["version".to_owned()]) {
        Ok(output) if output.success => {
            log_debug!("ADB", "{}", output.stdout.trim());
            Ok(())
        }
        _ => bail!("adb not found; install platform-tools and make sure adb is in PATH"),
    }
}

/// Command prefix for one target device; the serial, when present, is
/// applied to every invocation.
pub struct Adb {
    runner: Arc<dyn CommandRunner>,
    serial: Option<String>,
}

impl Adb {
    pub fn new(runner: Arc<dyn CommandRunner>, serial: Option<String>) -> Self {
        Self { runner, serial }
    }

    /// Verify the target device is attached and in the `device` state.
    pub fn check_device(&self) -> Result<()> {
        log_info!("ADB", "Checking device connection...");
        let output = self.exec(&["get-state"])?;
        if !output.stdout.contains("device") {
            match &self.serial {
                Some(serial) => bail!("device {} is not connected", serial),
                None => bail!("no device connected"),
            }
        }
        if let Some(serial) = &self.serial {
            log_info!("ADB", "Using device: {}", serial);
        }
        Ok(())
    }

    pub fn list_package(&self, package: &str) -> Result<bool> {
        let output = self.exec(&["shell", "pm", "list", "packages", package])?;
        Ok(output.stdout.contains(package))
    }

    pub fn install(&self, apk: &str) -> Result<ToolOutput> {
        self.exec(&["install", "-t", "-r", "-g", apk])
    }

    /// `appops` grant that lets the app capture system audio without the
    /// on-device consent dialog.
    pub fn grant_media_projection(&self, package: &str) -> Result<ToolOutput> {
        self.exec(&["shell", "appops", "set", package, "PROJECT_MEDIA", "allow"])
    }

    pub fn forward(&self, port: u16, socket_name: &str) -> Result<ToolOutput> {
        let local = format!("tcp:{}", port);
        let remote = format!("localabstract:{}", socket_name);
        self.exec(&["forward", &local, &remote])
    }

    pub fn start_activity(&self, activity: &str) -> Result<ToolOutput> {
        self.exec(&["shell", "am", "start", activity])
    }

    pub fn notification_listeners(&self) -> Result<String> {
        let output = self.exec(&[
            "shell",
            "settings",
            "get",
            "secure",
            "enabled_notification_listeners",
        ])?;
        Ok(output.stdout)
    }

    pub fn running_services(&self, package: &str) -> Result<String> {
        let output = self.exec(&["shell", "dumpsys", "activity", "services", package])?;
        Ok(output.stdout)
    }

    fn exec(&self, args: &[&str]) -> Result<ToolOutput> {
        let mut invocation: Vec<String> = Vec::with_capacity(args.len() + 2);
        if let Some(serial) = &self.serial {
            invocation.push("-s".to_owned());
            invocation.push(serial.clone());
        }
        invocation.extend(args.iter().map(|arg| (*arg).to_owned()));

        let printable = invocation.join(" ");
        let started = Instant::now();
        let output = self
            .runner
            .run(ADB, &invocation)
            .with_context(|| format!("failed to run {} {}", ADB, printable))?;
        log_debug!("ADB", "adb {} finished in {:?}", printable, started.elapsed());
        if !output.stdout.trim().is_empty() {
            log_debug!("ADB", "adb {}: {}", printable, output.stdout.trim());
        }
        if !output.success && !output.stderr.trim().is_empty() {
            log_debug!("ADB", "adb {} stderr: {}", printable, output.stderr.trim());
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::runner::testing::{ok, ScriptedRunner};
    use std::io;

    #[test]
    fn missing_adb_is_fatal() {
        let runner =
            ScriptedRunner::new(|_| Err(io::Error::new(io::ErrorKind::NotFound, "not found")));
        let err = check_adb(&runner).unwrap_err();
        assert!(err.to_string().contains("adb"));
    }

    #[test]
    fn broken_adb_is_fatal() {
        let runner = ScriptedRunner::new(|_| {
            Ok(ToolOutput {
                success: false,
                stdout: String::new(),
                stderr: "segfault".to_owned(),
            })
        });
        assert!(check_adb(&runner).is_err());
    }

    #[test]
    fn no_ready_device_is_fatal() {
        let runner = Arc::new(ScriptedRunner::new(|_| Ok(ok("offline\n"))));
        let adb = Adb::new(runner, None);
        assert!(adb.check_device().is_err());
    }

    #[test]
    fn unknown_serial_is_named_in_the_error() {
        let runner = Arc::new(ScriptedRunner::new(|_| Ok(ok(""))));
        let adb = Adb::new(runner, Some("emulator-5554".to_owned()));
        let err = adb.check_device().unwrap_err();
        assert!(err.to_string().contains("emulator-5554"));
    }

    #[test]
    fn serial_prefixes_every_invocation() {
        let runner = Arc::new(ScriptedRunner::new(|_| Ok(ok("device\n"))));
        let adb = Adb::new(runner.clone(), Some("emulator-5554".to_owned()));
        adb.check_device().unwrap();
        let calls = runner.calls();
        assert_eq!(&calls[0][..2], &["-s", "emulator-5554"]);
        assert_eq!(calls[0][2], "get-state");
    }

    #[test]
    fn forward_targets_the_abstract_socket() {
        let runner = Arc::new(ScriptedRunner::new(|_| Ok(ok(""))));
        let adb = Adb::new(runner.clone(), None);
        adb.forward(28200, "sndcpy").unwrap();
        assert_eq!(
            runner.calls()[0],
            vec!["forward", "tcp:28200", "localabstract:sndcpy"]
        );
    }
}
