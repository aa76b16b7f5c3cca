// src/host/psql.rs

//! Runs administrative queries through the `psql` client.

use crate::core::discovery::AdminQuery;
use crate::core::{AutoconfError, ConnParams, SystemUser};
use std::ffi::OsString;
use std::process::Command;
use tracing::debug;

/// Queries the cluster with `psql -AtX`, switching to the system user with
/// `sudo` unless already running as that user.
pub struct Psql {
    sysuser: String,
    switch_user: bool,
    search_path: OsString,
}

impl Psql {
    pub fn new(sysuser: &SystemUser, search_path: OsString) -> Self {
        // SAFETY: geteuid has no preconditions and cannot fail.
        let euid = unsafe { libc::geteuid() };
        Self {
            sysuser: sysuser.name.clone(),
            switch_user: euid != sysuser.uid,
            search_path,
        }
    }

    fn command(&self, conn: &ConnParams, sql: &str) -> Command {
        let mut cmd = if self.switch_user {
            let mut cmd = Command::new("sudo");
            cmd.args(["-u", &self.sysuser, "env"]);
            for (key, value) in conn.env() {
                cmd.arg(format!("{key}={value}"));
            }
            cmd.arg("psql");
            cmd
        } else {
            let mut cmd = Command::new("psql");
            cmd.envs(conn.env());
            cmd
        };
        cmd.args(["-AtXc", sql])
            .env("PATH", &self.search_path)
            .env("PGAPPNAME", "temboard-agent-autoconf");
        cmd
    }
}

impl AdminQuery for Psql {
    fn scalar(&self, conn: &ConnParams, sql: &str) -> Result<Option<String>, AutoconfError> {
        debug!("Querying Postgres: {}", sql);
        let output = self
            .command(conn, sql)
            .output()
            .map_err(|e| AutoconfError::Query(format!("Failed to run psql: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AutoconfError::Query(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.is_empty() {
            return Ok(None);
        }
        Ok(stdout.lines().next().map(|line| line.trim_end().to_string()))
    }
}
