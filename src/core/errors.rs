// src/core/errors.rs

//! Defines the primary error type for the provisioning pipeline.

use std::path::PathBuf;
use std::sync::Arc;
use strum_macros::{Display, IntoStaticStr};
use thiserror::Error;

/// The main error enum, representing every fatal condition of a provisioning run.
/// None of these are retried: the operator fixes the cause and reruns.
#[derive(Error, Debug)]
pub enum AutoconfError {
    #[error("Can't connect to Postgres cluster: {0}")]
    ClusterUnreachable(String),

    #[error("Postgres query failed: {0}")]
    Query(String),

    #[error("Postgres setting '{0}' is empty")]
    MissingSetting(String),

    #[error("Failed to read server version from '{path}': {source}")]
    VersionUnreadable {
        path: PathBuf,
        source: Arc<std::io::Error>,
    },

    #[error("pg_ctl for PostgreSQL {version} not found in PATH nor in {searched}")]
    ControlToolNotFound { version: String, searched: String },

    #[error("No free port between {low} and {high}")]
    NoFreePort { low: u16, high: u16 },

    #[error("Failed to find PKI directory. Searched {0}")]
    NoPkiDirectory(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        source: Arc<std::io::Error>,
    },

    #[error("Service supervisor error: {0}")]
    Supervisor(String),

    #[error("{} already exists. Remove it to configure a new agent for this cluster.", .0.display())]
    ExistingConfig(PathBuf),

    #[error("{0}")]
    Environment(String),
}

/// Broad classification of an [`AutoconfError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum ErrorKind {
    Discovery,
    Allocation,
    Provisioning,
    Conflict,
    Environment,
}

impl AutoconfError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AutoconfError::ClusterUnreachable(_)
            | AutoconfError::Query(_)
            | AutoconfError::MissingSetting(_)
            | AutoconfError::VersionUnreadable { .. }
            | AutoconfError::ControlToolNotFound { .. } => ErrorKind::Discovery,
            AutoconfError::NoFreePort { .. } => ErrorKind::Allocation,
            AutoconfError::NoPkiDirectory(_)
            | AutoconfError::Certificate(_)
            | AutoconfError::Io { .. }
            | AutoconfError::Supervisor(_) => ErrorKind::Provisioning,
            AutoconfError::ExistingConfig(_) => ErrorKind::Conflict,
            AutoconfError::Environment(_) => ErrorKind::Environment,
        }
    }

    /// Wraps an I/O failure together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AutoconfError::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
impl Clone for AutoconfError {
    fn clone(&self) -> Self {
        match self {
            AutoconfError::ClusterUnreachable(s) => AutoconfError::ClusterUnreachable(s.clone()),
            AutoconfError::Query(s) => AutoconfError::Query(s.clone()),
            AutoconfError::MissingSetting(s) => AutoconfError::MissingSetting(s.clone()),
            AutoconfError::VersionUnreadable { path, source } => AutoconfError::VersionUnreadable {
                path: path.clone(),
                source: Arc::clone(source),
            },
            AutoconfError::ControlToolNotFound { version, searched } => {
                AutoconfError::ControlToolNotFound {
                    version: version.clone(),
                    searched: searched.clone(),
                }
            }
            AutoconfError::NoFreePort { low, high } => AutoconfError::NoFreePort {
                low: *low,
                high: *high,
            },
            AutoconfError::NoPkiDirectory(s) => AutoconfError::NoPkiDirectory(s.clone()),
            AutoconfError::Certificate(s) => AutoconfError::Certificate(s.clone()),
            AutoconfError::Io { path, source } => AutoconfError::Io {
                path: path.clone(),
                source: Arc::clone(source),
            },
            AutoconfError::Supervisor(s) => AutoconfError::Supervisor(s.clone()),
            AutoconfError::ExistingConfig(p) => AutoconfError::ExistingConfig(p.clone()),
            AutoconfError::Environment(s) => AutoconfError::Environment(s.clone()),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<rcgen::Error> for AutoconfError {
    fn from(e: rcgen::Error) -> Self {
        AutoconfError::Certificate(e.to_string())
    }
}

impl From<getrandom::Error> for AutoconfError {
    fn from(e: getrandom::Error) -> Self {
        AutoconfError::Environment(format!("Failed to read random bytes: {e}"))
    }
}
