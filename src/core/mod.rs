// src/core/mod.rs

//! The provisioning decision pipeline: discovery, port allocation, TLS
//! resolution and configuration synthesis.

pub mod context;
pub mod discovery;
pub mod document;
pub mod errors;
pub mod generator;
pub mod install;
pub mod layout;
pub mod ports;
pub mod secret;
pub mod service;
pub mod tls;

pub use context::{ClusterContext, ConnParams, SystemUser};
pub use document::ConfigurationDocument;
pub use errors::{AutoconfError, ErrorKind};
pub use ports::PortAssignment;
pub use secret::SharedSecret;
pub use tls::TlsMaterial;

/// Rejects hostnames that are not fully qualified.
pub fn validate_fqdn(hostname: &str) -> Result<(), AutoconfError> {
    let hostname = hostname.trim();
    let dotted = hostname.contains('.') && hostname.split('.').all(|label| !label.is_empty());
    if !dotted {
        return Err(AutoconfError::Environment(format!(
            "Hostname '{hostname}' is not fully qualified. Set TEMBOARD_HOSTNAME or --hostname to a FQDN."
        )));
    }
    Ok(())
}
