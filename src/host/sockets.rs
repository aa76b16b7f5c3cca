// src/host/sockets.rs

//! Reads listening IPv4 TCP sockets from procfs.

use crate::core::AutoconfError;
use crate::core::ports::ListeningPorts;
use std::collections::BTreeSet;
use std::fs;
use std::ops::RangeInclusive;
use std::path::PathBuf;

pub const PROC_NET_TCP: &str = "/proc/net/tcp";

/// `st` column value of a socket in LISTEN state.
const TCP_LISTEN: &str = "0A";

#[derive(Debug, Clone)]
pub struct ProcNetTcp {
    path: PathBuf,
}

impl ProcNetTcp {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcNetTcp {
    fn default() -> Self {
        Self::new(PROC_NET_TCP)
    }
}

impl ListeningPorts for ProcNetTcp {
    fn listening_in(&self, range: RangeInclusive<u16>) -> Result<BTreeSet<u16>, AutoconfError> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            AutoconfError::Environment(format!(
                "Failed to read listening sockets from '{}': {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(parse_listening(&contents, range))
    }
}

/// Extracts local ports of LISTEN sockets within `range` from `/proc/net/tcp` text.
pub fn parse_listening(contents: &str, range: RangeInclusive<u16>) -> BTreeSet<u16> {
    contents
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let local = fields.get(1)?;
            let state = fields.get(3)?;
            if *state != TCP_LISTEN {
                return None;
            }
            let (_, port) = local.rsplit_once(':')?;
            u16::from_str_radix(port, 16).ok()
        })
        .filter(|port| range.contains(port))
        .collect()
}
