// src/core/context.rs

//! The immutable record describing the target cluster, built once by discovery.

use std::path::PathBuf;

/// The Unix account that runs the Postgres cluster and, later, the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemUser {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub group: String,
    pub home: PathBuf,
}

/// libpq-style connection parameters for the administrative session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnParams {
    /// Host name or Unix socket directory. Empty means libpq's compiled-in default.
    pub host: String,
    pub port: u16,
    pub user: String,
    pub dbname: String,
}

impl ConnParams {
    /// The parameters as `PG*` environment variables, skipping an empty host.
    pub fn env(&self) -> Vec<(&'static str, String)> {
        let mut vars = Vec::with_capacity(4);
        if !self.host.is_empty() {
            vars.push(("PGHOST", self.host.clone()));
        }
        vars.push(("PGPORT", self.port.to_string()));
        vars.push(("PGUSER", self.user.clone()));
        vars.push(("PGDATABASE", self.dbname.clone()));
        vars
    }
}

/// Everything discovery learned about the running cluster.
#[derive(Debug, Clone)]
pub struct ClusterContext {
    pub sysuser: SystemUser,
    pub conn: ConnParams,
    pub data_dir: PathBuf,
    pub version: String,
    /// Absolute path of the `pg_ctl` matching `version`.
    pub pg_ctl: PathBuf,
    pub name: String,
}
