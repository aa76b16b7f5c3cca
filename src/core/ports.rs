// src/core/ports.rs

//! Lowest-free-port allocation for the agent's HTTPS listener.
//!
//! Allocation is check-then-use: the host's listening sockets are read, the
//! first absent port is returned, and nothing is reserved. Another process can
//! bind the port before the agent starts. The optional bind check narrows this
//! window, it does not close it.

use super::errors::AutoconfError;
use std::collections::BTreeSet;
use std::net::{Ipv4Addr, TcpListener};
use std::ops::RangeInclusive;
use tracing::{debug, info};

pub const PORT_RANGE_START: u16 = 2345;
pub const PORT_RANGE_END: u16 = 3000;

pub fn port_range() -> RangeInclusive<u16> {
    PORT_RANGE_START..=PORT_RANGE_END
}

/// The host network-state collaborator.
pub trait ListeningPorts {
    /// Ports in `range` bound by a listening IPv4 TCP socket.
    fn listening_in(&self, range: RangeInclusive<u16>) -> Result<BTreeSet<u16>, AutoconfError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PortAssignment(u16);

impl PortAssignment {
    pub fn port(self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for PortAssignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns the lowest port of `range` absent from `used`.
pub fn first_free(range: RangeInclusive<u16>, used: &BTreeSet<u16>) -> Option<u16> {
    range.into_iter().find(|port| !used.contains(port))
}

pub struct PortAllocator<'a> {
    probe: &'a dyn ListeningPorts,
    bind_check: bool,
}

impl<'a> PortAllocator<'a> {
    pub fn new(probe: &'a dyn ListeningPorts) -> Self {
        Self {
            probe,
            bind_check: false,
        }
    }

    /// Also require the port to be bindable on all IPv4 interfaces.
    pub fn with_bind_check(mut self, enabled: bool) -> Self {
        self.bind_check = enabled;
        self
    }

    pub fn allocate(&self) -> Result<PortAssignment, AutoconfError> {
        let range = port_range();
        let mut used = self.probe.listening_in(range.clone())?;
        debug!("{} ports in use between {} and {}.", used.len(), PORT_RANGE_START, PORT_RANGE_END);

        while let Some(port) = first_free(range.clone(), &used) {
            if !self.bind_check || can_bind(port) {
                info!("Using port {}.", port);
                return Ok(PortAssignment(port));
            }
            debug!("Port {} is not listed as used but cannot be bound.", port);
            used.insert(port);
        }

        Err(AutoconfError::NoFreePort {
            low: PORT_RANGE_START,
            high: PORT_RANGE_END,
        })
    }
}

fn can_bind(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).is_ok()
}
