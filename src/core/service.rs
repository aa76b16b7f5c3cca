// src/core/service.rs

//! The service-supervisor collaborator and systemd unit naming.

use super::errors::AutoconfError;
use std::fmt::Write;

/// Account override for a unit that must not run as the packaged default user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunAs {
    pub user: String,
    pub group: String,
}

pub trait ServiceSupervisor {
    /// Whether the supervisor is running on this host.
    fn is_available(&self) -> bool;

    /// Enables `unit` for boot, applying `run_as` first when given.
    fn enable(&self, unit: &str, run_as: Option<&RunAs>) -> Result<(), AutoconfError>;
}

/// Escapes a string like `systemd-escape` does for unit instance names.
pub fn systemd_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for (i, byte) in value.bytes().enumerate() {
        match byte {
            b'/' => escaped.push('-'),
            b'.' if i == 0 => {
                let _ = write!(escaped, "\\x{byte:02x}");
            }
            b if b.is_ascii_alphanumeric() || matches!(b, b':' | b'_' | b'.') => {
                escaped.push(b as char)
            }
            b => {
                let _ = write!(escaped, "\\x{b:02x}");
            }
        }
    }
    escaped
}

/// Instantiates the unit template for a cluster.
pub fn unit_name(template: &str, cluster_name: &str) -> String {
    template.replace("{name}", &systemd_escape(cluster_name))
}
