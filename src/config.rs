// src/config.rs

//! Manages provisioning settings: loading, resolving overrides, and validation.
//!
//! Values are layered in this order, later sources winning: built-in defaults,
//! an optional TOML file, the historical environment variables (`SYSUSER`,
//! `PGHOST`, ...) and finally command-line flags.

use crate::core::tls::not_after;
use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Settings file read when `--config` is not given. Its absence is not an error.
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/temboard-agent/autoconf.toml";

/// Environment variables honored as overrides, paired with the setting they target.
pub const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("SYSUSER", "sysuser"),
    ("ETCDIR", "etcdir"),
    ("VARDIR", "vardir"),
    ("LOGDIR", "logdir"),
    ("LOGFILE", "logfile"),
    ("TEMBOARD_HOSTNAME", "hostname"),
    ("PGHOST", "postgres.host"),
    ("PGPORT", "postgres.port"),
    ("PGUSER", "postgres.user"),
    ("PGDATABASE", "postgres.dbname"),
];

/// The resolved provisioning settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Settings {
    /// Unix account running the Postgres cluster.
    #[serde(default = "default_sysuser")]
    pub sysuser: String,
    #[serde(default = "default_etcdir")]
    pub etcdir: PathBuf,
    #[serde(default = "default_vardir")]
    pub vardir: PathBuf,
    #[serde(default = "default_logdir")]
    pub logdir: PathBuf,
    /// Diagnostic log of this run. Removed on success, kept on failure.
    #[serde(default = "default_logfile")]
    pub logfile: PathBuf,
    /// Fully qualified hostname of this host. Resolved from the system when unset.
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log rotation policy shared by every agent on the host.
    #[serde(default = "default_logrotate_path")]
    pub logrotate_path: PathBuf,
    #[serde(default)]
    pub postgres: PostgresSettings,
    #[serde(default)]
    pub ports: PortSettings,
    #[serde(default)]
    pub tls: TlsSettings,
    #[serde(default)]
    pub service: ServiceSettings,
}

/// Connection overrides and binary lookup for the target cluster.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PostgresSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub dbname: Option<String>,
    /// Directories searched for `pg_ctl` when it is not in `PATH`. `{version}` is
    /// replaced by the server version.
    #[serde(default = "default_bindirs")]
    pub bindirs: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PortSettings {
    /// Try to bind the chosen port before accepting it.
    #[serde(default = "default_bind_check")]
    pub bind_check: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TlsSettings {
    /// Candidate PKI roots, first existing wins. `{etcdir}` and `{name}` are expanded.
    #[serde(default = "default_pki_dirs")]
    pub pki_dirs: Vec<String>,
    /// Validity of a generated self-signed certificate.
    #[serde(with = "humantime_serde", default = "default_validity")]
    pub validity: Duration,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServiceSettings {
    /// Unit name, `{name}` being the systemd-escaped cluster name.
    #[serde(default = "default_unit_template")]
    pub unit_template: String,
    /// Where unit drop-ins are written.
    #[serde(default = "default_unit_dir")]
    pub unit_dir: PathBuf,
    /// The user the packaged unit already runs as. No drop-in is written for it.
    #[serde(default = "default_sysuser")]
    pub default_user: String,
    #[serde(default = "default_agent_command")]
    pub agent_command: String,
}

fn default_sysuser() -> String {
    "postgres".to_string()
}
fn default_etcdir() -> PathBuf {
    PathBuf::from("/etc/temboard-agent")
}
fn default_vardir() -> PathBuf {
    PathBuf::from("/var/lib/temboard-agent")
}
fn default_logdir() -> PathBuf {
    PathBuf::from("/var/log/temboard-agent")
}
fn default_logfile() -> PathBuf {
    PathBuf::from("/var/log/temboard-agent-autoconf.log")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_logrotate_path() -> PathBuf {
    PathBuf::from("/etc/logrotate.d/temboard-agent")
}
fn default_bindirs() -> Vec<String> {
    vec![
        "/usr/lib/postgresql/{version}/bin".to_string(),
        "/usr/pgsql-{version}/bin".to_string(),
    ]
}
fn default_bind_check() -> bool {
    true
}
fn default_pki_dirs() -> Vec<String> {
    vec![
        "/etc/pki/tls".to_string(),
        "/etc/ssl".to_string(),
        "{etcdir}/{name}".to_string(),
    ]
}
fn default_validity() -> Duration {
    Duration::from_secs(365 * 24 * 3600)
}
fn default_unit_template() -> String {
    "temboard-agent@{name}.service".to_string()
}
fn default_unit_dir() -> PathBuf {
    PathBuf::from("/etc/systemd/system")
}
fn default_agent_command() -> String {
    "temboard-agent".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sysuser: default_sysuser(),
            etcdir: default_etcdir(),
            vardir: default_vardir(),
            logdir: default_logdir(),
            logfile: default_logfile(),
            hostname: None,
            log_level: default_log_level(),
            logrotate_path: default_logrotate_path(),
            postgres: PostgresSettings::default(),
            ports: PortSettings::default(),
            tls: TlsSettings::default(),
            service: ServiceSettings::default(),
        }
    }
}

impl Default for PostgresSettings {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            user: None,
            dbname: None,
            bindirs: default_bindirs(),
        }
    }
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            bind_check: default_bind_check(),
        }
    }
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            pki_dirs: default_pki_dirs(),
            validity: default_validity(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            unit_template: default_unit_template(),
            unit_dir: default_unit_dir(),
            default_user: default_sysuser(),
            agent_command: default_agent_command(),
        }
    }
}

impl Settings {
    /// Creates a new `Settings` instance by reading and parsing a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file at '{}'", path.display()))?;
        let settings: Settings = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from '{}'", path.display()))?;
        Ok(settings)
    }

    /// Loads the settings from every source and validates the result.
    ///
    /// An explicit `path` must exist. Without one, [`DEFAULT_SETTINGS_PATH`] is
    /// read if present. `env` looks up environment variables, `overrides` are
    /// `(key, value)` pairs from the command line.
    pub fn load<F>(path: Option<&Path>, env: F, overrides: &[(&str, String)]) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_SETTINGS_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_SETTINGS_PATH))?
            }
            None => Settings::default(),
        };

        for (var, key) in ENV_OVERRIDES {
            if let Some(value) = env(var)
                && !value.is_empty()
            {
                settings
                    .set(key, value)
                    .with_context(|| format!("Invalid value in environment variable {var}"))?;
            }
        }
        for (key, value) in overrides {
            settings.set(key, value.clone())?;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Loads the settings using the process environment.
    pub fn from_env(path: Option<&Path>, overrides: &[(&str, String)]) -> Result<Self> {
        Self::load(path, |var| std::env::var(var).ok(), overrides)
    }

    /// Assigns a single setting addressed by its dotted key.
    pub fn set(&mut self, key: &str, value: String) -> Result<()> {
        match key {
            "sysuser" => self.sysuser = value,
            "etcdir" => self.etcdir = PathBuf::from(value),
            "vardir" => self.vardir = PathBuf::from(value),
            "logdir" => self.logdir = PathBuf::from(value),
            "logfile" => self.logfile = PathBuf::from(value),
            "hostname" => self.hostname = Some(value),
            "log_level" => self.log_level = value,
            "postgres.host" => self.postgres.host = Some(value),
            "postgres.port" => {
                let port = value
                    .trim()
                    .parse::<u16>()
                    .with_context(|| format!("Invalid port number '{value}'"))?;
                self.postgres.port = Some(port);
            }
            "postgres.user" => self.postgres.user = Some(value),
            "postgres.dbname" => self.postgres.dbname = Some(value),
            "ports.bind_check" => {
                self.ports.bind_check = value
                    .parse()
                    .with_context(|| format!("Invalid boolean '{value}'"))?;
            }
            _ => return Err(anyhow!("unknown setting '{key}'")),
        }
        Ok(())
    }

    /// Validates the resolved settings to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.sysuser.trim().is_empty() {
            return Err(anyhow!("sysuser cannot be empty"));
        }
        for (name, dir) in [
            ("etcdir", &self.etcdir),
            ("vardir", &self.vardir),
            ("logdir", &self.logdir),
            ("logfile", &self.logfile),
        ] {
            if !dir.is_absolute() {
                return Err(anyhow!("{name} must be an absolute path, got '{}'", dir.display()));
            }
        }
        if let Some(hostname) = &self.hostname
            && hostname.trim().is_empty()
        {
            return Err(anyhow!("hostname cannot be empty"));
        }
        if self.postgres.port == Some(0) {
            return Err(anyhow!("postgres.port cannot be 0"));
        }
        if self.postgres.bindirs.is_empty() {
            return Err(anyhow!("postgres.bindirs cannot be empty"));
        }
        for dir in &self.postgres.bindirs {
            if !dir.contains("{version}") {
                warn!(
                    "postgres.bindirs entry '{}' does not depend on the server version.",
                    dir
                );
            }
        }
        if self.tls.pki_dirs.is_empty() {
            return Err(anyhow!("tls.pki_dirs cannot be empty"));
        }
        if self.tls.validity.is_zero() {
            return Err(anyhow!("tls.validity cannot be 0"));
        }
        not_after(Utc::now(), self.tls.validity)
            .map_err(|e| anyhow!("tls.validity is too large: {e}"))?;
        if !self.service.unit_template.contains("{name}") {
            return Err(anyhow!(
                "service.unit_template must contain '{{name}}', got '{}'",
                self.service.unit_template
            ));
        }
        Ok(())
    }
}
