// src/host/systemd.rs

//! systemd as the service supervisor.

use super::fs::HostInstaller;
use crate::core::AutoconfError;
use crate::core::install::Installer;
use crate::core::service::{RunAs, ServiceSupervisor};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// Present when systemd is the running init system.
pub const SYSTEMD_RUNTIME_DIR: &str = "/run/systemd/system";

pub struct Systemd {
    unit_dir: PathBuf,
}

impl Systemd {
    pub fn new(unit_dir: impl Into<PathBuf>) -> Self {
        Self {
            unit_dir: unit_dir.into(),
        }
    }

    /// Drop-in overriding `User=` and `Group=` of `unit`.
    pub fn user_dropin(&self, unit: &str) -> PathBuf {
        self.unit_dir.join(format!("{unit}.d")).join("user.conf")
    }

    fn systemctl(&self, args: &[&str]) -> Result<(), AutoconfError> {
        let output = Command::new("systemctl")
            .args(args)
            .output()
            .map_err(|e| AutoconfError::Supervisor(format!("Failed to run systemctl: {e}")))?;
        if !output.status.success() {
            return Err(AutoconfError::Supervisor(format!(
                "systemctl {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

impl ServiceSupervisor for Systemd {
    fn is_available(&self) -> bool {
        Path::new(SYSTEMD_RUNTIME_DIR).is_dir()
    }

    fn enable(&self, unit: &str, run_as: Option<&RunAs>) -> Result<(), AutoconfError> {
        if let Some(run_as) = run_as {
            let dropin = self.user_dropin(unit);
            if let Some(dir) = dropin.parent() {
                HostInstaller.create_dir(dir, None, 0o755)?;
            }
            let contents = format!(
                "[Service]\nUser={}\nGroup={}\n",
                run_as.user, run_as.group
            );
            HostInstaller.write_file(&dropin, contents.as_bytes(), None, 0o644)?;
            info!("Running {} as {}:{}.", unit, run_as.user, run_as.group);
            self.systemctl(&["daemon-reload"])?;
        }
        self.systemctl(&["enable", unit])?;
        info!("Enabled {}.", unit);
        Ok(())
    }
}
