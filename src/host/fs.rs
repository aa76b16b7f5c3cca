// src/host/fs.rs

//! Filesystem installer applying explicit modes and ownership.

use crate::core::AutoconfError;
use crate::core::install::{Installer, Ownership};
use std::fs::{self, OpenOptions, Permissions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt, chown};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Default, Clone, Copy)]
pub struct HostInstaller;

impl HostInstaller {
    fn apply(path: &Path, owner: Option<Ownership>, mode: u32) -> Result<(), AutoconfError> {
        fs::set_permissions(path, Permissions::from_mode(mode))
            .map_err(|e| AutoconfError::io(path, e))?;
        if let Some(owner) = owner {
            chown(path, Some(owner.uid), Some(owner.gid)).map_err(|e| AutoconfError::io(path, e))?;
        }
        Ok(())
    }
}

impl Installer for HostInstaller {
    fn create_dir(
        &self,
        path: &Path,
        owner: Option<Ownership>,
        mode: u32,
    ) -> Result<(), AutoconfError> {
        fs::create_dir_all(path).map_err(|e| AutoconfError::io(path, e))?;
        Self::apply(path, owner, mode)?;
        debug!("Created directory {} ({:o}).", path.display(), mode);
        Ok(())
    }

    fn write_file(
        &self,
        path: &Path,
        contents: &[u8],
        owner: Option<Ownership>,
        mode: u32,
    ) -> Result<(), AutoconfError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(path)
            .map_err(|e| AutoconfError::io(path, e))?;
        file.write_all(contents)
            .map_err(|e| AutoconfError::io(path, e))?;
        // `mode` only applies to new files and is subject to the umask.
        Self::apply(path, owner, mode)?;
        debug!("Wrote {} ({:o}).", path.display(), mode);
        Ok(())
    }

    fn create_if_absent(
        &self,
        path: &Path,
        contents: &[u8],
        owner: Option<Ownership>,
        mode: u32,
    ) -> Result<bool, AutoconfError> {
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(mode)
            .open(path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(AutoconfError::io(path, e)),
        };
        file.write_all(contents)
            .map_err(|e| AutoconfError::io(path, e))?;
        Self::apply(path, owner, mode)?;
        Ok(true)
    }
}
