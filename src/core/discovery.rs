// src/core/discovery.rs

//! Resolves identity and connection parameters of the running Postgres cluster.
//!
//! Discovery only talks to the cluster through [`AdminQuery`]. It reads a few
//! settings from `pg_settings`, the `PG_VERSION` marker of the data directory,
//! and looks up the matching `pg_ctl` binary.

use super::context::{ClusterContext, ConnParams, SystemUser};
use super::errors::AutoconfError;
use super::layout::validate_cluster_name;
use crate::config::PostgresSettings;
use std::env;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_SOCKET_DIR: &str = "/var/run/postgresql";
pub const CONTROL_TOOL: &str = "pg_ctl";
pub const PROBE_QUERY: &str = "SELECT 'Postgres connection working.';";

/// The administrative query collaborator: one scalar query, zero or one text value.
pub trait AdminQuery {
    fn scalar(&self, conn: &ConnParams, sql: &str) -> Result<Option<String>, AutoconfError>;
}

/// Builds the query reading one server setting.
pub fn setting_query(name: &str) -> String {
    format!(
        "SELECT setting FROM pg_settings WHERE name = '{}';",
        name.replace('\'', "''")
    )
}

pub struct ClusterDiscovery<'a> {
    query: &'a dyn AdminQuery,
    settings: &'a PostgresSettings,
    search_path: OsString,
}

impl<'a> ClusterDiscovery<'a> {
    /// `search_path` is the executable search path in effect, usually `$PATH`.
    pub fn new(
        query: &'a dyn AdminQuery,
        settings: &'a PostgresSettings,
        search_path: OsString,
    ) -> Self {
        Self {
            query,
            settings,
            search_path,
        }
    }

    pub fn discover(&self, sysuser: &SystemUser) -> Result<ClusterContext, AutoconfError> {
        let conn = self.connection_params(sysuser)?;
        info!(
            "Connecting to Postgres as {} on {}:{}/{}.",
            conn.user, conn.host, conn.port, conn.dbname
        );

        match self.query.scalar(&conn, PROBE_QUERY) {
            Ok(Some(_)) => debug!("Postgres connection working."),
            Ok(None) => {
                return Err(AutoconfError::ClusterUnreachable(
                    "connectivity probe returned no row".to_string(),
                ));
            }
            Err(e) => return Err(AutoconfError::ClusterUnreachable(e.to_string())),
        }

        let data_dir = self
            .setting(&conn, "data_directory")?
            .map(PathBuf::from)
            .ok_or_else(|| AutoconfError::MissingSetting("data_directory".to_string()))?;
        let version = read_version(&data_dir)?;
        info!(
            "Found PostgreSQL {} cluster in {}.",
            version,
            data_dir.display()
        );

        let pg_ctl = locate_control_tool(&self.search_path, &version, &self.settings.bindirs)?;

        let cluster_name = self.setting(&conn, "cluster_name")?;
        let name = derive_cluster_name(
            cluster_name.as_deref(),
            &data_dir,
            &sysuser.home,
            &version,
            conn.port,
        );
        validate_cluster_name(&name)?;
        info!("Configuring temboard-agent for cluster {}.", name);

        Ok(ClusterContext {
            sysuser: sysuser.clone(),
            conn,
            data_dir,
            version,
            pg_ctl,
            name,
        })
    }

    /// Resolves user, database, port and host, in that order.
    fn connection_params(&self, sysuser: &SystemUser) -> Result<ConnParams, AutoconfError> {
        let user = non_empty(self.settings.user.as_deref()).unwrap_or(sysuser.name.as_str());
        let dbname = non_empty(self.settings.dbname.as_deref()).unwrap_or(user);
        let mut conn = ConnParams {
            host: String::new(),
            port: self.settings.port.unwrap_or(DEFAULT_PORT),
            user: user.to_string(),
            dbname: dbname.to_string(),
        };

        conn.host = match non_empty(self.settings.host.as_deref()) {
            Some(host) => host.to_string(),
            None => {
                let dirs = self
                    .setting(&conn, "unix_socket_directories")
                    .map_err(|e| AutoconfError::ClusterUnreachable(e.to_string()))?;
                first_socket_dir(dirs.as_deref())
            }
        };
        Ok(conn)
    }

    /// Reads a setting, mapping an empty value to `None`.
    fn setting(&self, conn: &ConnParams, name: &str) -> Result<Option<String>, AutoconfError> {
        let value = self.query.scalar(conn, &setting_query(name))?;
        Ok(value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Keeps the first entry of a comma separated `unix_socket_directories` value.
pub fn first_socket_dir(value: Option<&str>) -> String {
    value
        .and_then(|v| v.split(',').map(str::trim).find(|d| !d.is_empty()))
        .unwrap_or(DEFAULT_SOCKET_DIR)
        .to_string()
}

/// Reads the server version from the `PG_VERSION` marker of a data directory.
pub fn read_version(data_dir: &Path) -> Result<String, AutoconfError> {
    let path = data_dir.join("PG_VERSION");
    let contents =
        fs::read_to_string(&path).map_err(|e| AutoconfError::VersionUnreadable {
            path: path.clone(),
            source: Arc::new(e),
        })?;
    let version = contents.trim();
    if version.is_empty() {
        return Err(AutoconfError::VersionUnreadable {
            path,
            source: Arc::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "empty version marker",
            )),
        });
    }
    Ok(version.to_string())
}

/// Finds `pg_ctl`, first in `search_path`, then in the version-keyed `bindirs`.
///
/// Relative directories are skipped. The result is absolute, so later
/// commands do not depend on `PATH`.
pub fn locate_control_tool(
    search_path: &OsStr,
    version: &str,
    bindirs: &[String],
) -> Result<PathBuf, AutoconfError> {
    if let Some(found) = find_in_path(search_path, CONTROL_TOOL) {
        debug!("Using {} from PATH.", found.display());
        return Ok(found);
    }

    let candidates: Vec<PathBuf> = bindirs
        .iter()
        .map(|dir| PathBuf::from(dir.replace("{version}", version)))
        .collect();

    for dir in candidates.iter().filter(|dir| dir.is_absolute()) {
        let tool = dir.join(CONTROL_TOOL);
        if is_executable(&tool) {
            info!("Using PostgreSQL binaries from {}.", dir.display());
            return Ok(tool);
        }
    }

    Err(AutoconfError::ControlToolNotFound {
        version: version.to_string(),
        searched: candidates
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

fn find_in_path(search_path: &OsStr, tool: &str) -> Option<PathBuf> {
    env::split_paths(search_path)
        .filter(|dir| dir.is_absolute())
        .map(|dir| dir.join(tool))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Derives the cluster name.
///
/// An explicit `cluster_name` setting wins. Otherwise a data directory under
/// the system user's home is named after its relative path (`9.4/main`), and
/// any other one after version and port (`12/pg5433`).
pub fn derive_cluster_name(
    setting: Option<&str>,
    data_dir: &Path,
    home: &Path,
    version: &str,
    port: u16,
) -> String {
    if let Some(name) = non_empty(setting) {
        return name.to_string();
    }
    match data_dir.strip_prefix(home) {
        Ok(relative) if !relative.as_os_str().is_empty() => {
            relative.to_string_lossy().into_owned()
        }
        _ => format!("{version}/pg{port}"),
    }
}
