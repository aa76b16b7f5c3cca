// src/core/layout.rs

//! On-disk locations of one agent instance, derived from settings and cluster name.
//!
//! The cluster name comes from the server and is joined under directories
//! the tool creates as root. It must stay a relative path made of plain
//! components.

use super::errors::AutoconfError;
use crate::config::Settings;
use std::path::{Component, Path, PathBuf};

pub const CONFIG_FILE: &str = "temboard-agent.conf";
pub const FRAGMENT_DIR: &str = "temboard-agent.conf.d";
pub const OVERLAY_FILE: &str = "auto.conf";
pub const USERS_FILE: &str = "users";

/// Turns a cluster name like `9.4/main` into a file name token (`9.4-main`).
pub fn normalize_name(name: &str) -> String {
    name.replace('/', "-")
}

/// Rejects cluster names that could resolve outside of their base directory.
pub fn validate_cluster_name(name: &str) -> Result<(), AutoconfError> {
    let invalid = |reason: &str| {
        Err(AutoconfError::Environment(format!(
            "Invalid cluster name '{name}': {reason}. Set cluster_name to a relative name like 'main'."
        )))
    };
    if name.trim().is_empty() {
        return invalid("empty name");
    }
    if name.contains('\0') {
        return invalid("contains a NUL byte");
    }
    let path = Path::new(name);
    if path.is_absolute() {
        return invalid("absolute path");
    }
    // `components()` silently drops inner `.` segments, check the raw text too.
    if name.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return invalid("empty, '.' or '..' path segment");
    }
    if !path.components().all(|c| matches!(c, Component::Normal(_))) {
        return invalid("not a plain relative path");
    }
    Ok(())
}

/// Joins `name` under `base`, refusing any result that is not strictly below it.
fn contained(base: &Path, name: &str) -> Result<PathBuf, AutoconfError> {
    let path = base.join(name);
    match path.strip_prefix(base) {
        Ok(rest) if rest.components().all(|c| matches!(c, Component::Normal(_)))
            && rest.components().next().is_some() =>
        {
            Ok(path)
        }
        _ => Err(AutoconfError::Environment(format!(
            "Cluster name '{}' escapes {}.",
            name,
            base.display()
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterLayout {
    pub name: String,
    pub token: String,
    pub conf_dir: PathBuf,
    /// The user-owned main configuration file. Its presence guards against reruns.
    pub config_file: PathBuf,
    pub fragment_dir: PathBuf,
    /// The machine-owned overlay, loaded after `config_file`.
    pub overlay_file: PathBuf,
    pub users_file: PathBuf,
    pub home: PathBuf,
    pub logdir: PathBuf,
    pub agent_log: PathBuf,
}

impl ClusterLayout {
    pub fn new(settings: &Settings, name: &str) -> Result<Self, AutoconfError> {
        validate_cluster_name(name)?;
        let token = normalize_name(name);
        let conf_dir = contained(&settings.etcdir, name)?;
        let home = contained(&settings.vardir, name)?;
        let agent_log = contained(&settings.logdir, &format!("{token}.log"))?;
        let fragment_dir = conf_dir.join(FRAGMENT_DIR);
        Ok(Self {
            name: name.to_string(),
            config_file: conf_dir.join(CONFIG_FILE),
            overlay_file: fragment_dir.join(OVERLAY_FILE),
            users_file: conf_dir.join(USERS_FILE),
            logdir: settings.logdir.clone(),
            home,
            agent_log,
            fragment_dir,
            conf_dir,
            token,
        })
    }
}
