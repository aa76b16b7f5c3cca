// src/host/mod.rs

//! Host-side implementations of the provisioning collaborators.

pub mod fs;
pub mod hostname;
pub mod psql;
pub mod sockets;
pub mod systemd;
pub mod users;

pub use fs::HostInstaller;
pub use psql::Psql;
pub use sockets::ProcNetTcp;
pub use systemd::Systemd;
