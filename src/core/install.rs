// src/core/install.rs

//! The filesystem collaborator used to materialize directories and files.

use super::context::SystemUser;
use super::errors::AutoconfError;
use std::path::Path;

/// Numeric owner applied to created paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    pub uid: u32,
    pub gid: u32,
}

impl From<&SystemUser> for Ownership {
    fn from(user: &SystemUser) -> Self {
        Self {
            uid: user.uid,
            gid: user.gid,
        }
    }
}

pub trait Installer {
    /// Creates `path` and missing parents. An existing directory is reused and
    /// gets `mode` and `owner` applied again.
    fn create_dir(&self, path: &Path, owner: Option<Ownership>, mode: u32)
    -> Result<(), AutoconfError>;

    /// Creates or truncates `path` with `contents`.
    fn write_file(
        &self,
        path: &Path,
        contents: &[u8],
        owner: Option<Ownership>,
        mode: u32,
    ) -> Result<(), AutoconfError>;

    /// Creates `path` only if it does not exist yet. Returns whether it was created.
    fn create_if_absent(
        &self,
        path: &Path,
        contents: &[u8],
        owner: Option<Ownership>,
        mode: u32,
    ) -> Result<bool, AutoconfError>;
}
