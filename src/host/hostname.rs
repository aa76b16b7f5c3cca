// src/host/hostname.rs

use crate::core::AutoconfError;
use std::process::Command;
use sysinfo::System;
use tracing::debug;

/// Returns the configured hostname, else asks `hostname --fqdn`, else the kernel.
///
/// The result is not validated here; a short name is rejected by the plan.
pub fn resolve_hostname(configured: Option<&str>) -> Result<String, AutoconfError> {
    if let Some(hostname) = configured {
        return Ok(hostname.trim().to_string());
    }

    match Command::new("hostname").arg("--fqdn").output() {
        Ok(output) if output.status.success() => {
            let fqdn = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !fqdn.is_empty() {
                return Ok(fqdn);
            }
        }
        Ok(output) => debug!(
            "hostname --fqdn failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ),
        Err(e) => debug!("Failed to run hostname --fqdn: {}", e),
    }

    System::host_name().ok_or_else(|| {
        AutoconfError::Environment(
            "Failed to determine hostname. Set TEMBOARD_HOSTNAME.".to_string(),
        )
    })
}
