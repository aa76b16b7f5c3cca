// src/host/users.rs

//! System account lookup through the C library's passwd and group databases.

use crate::core::{AutoconfError, SystemUser};
use std::ffi::{CStr, CString};
use std::io;
use std::path::PathBuf;

const INITIAL_BUFFER: usize = 4096;
const MAX_BUFFER: usize = 1 << 20;

/// Looks up a user by name.
pub fn lookup(name: &str) -> Result<SystemUser, AutoconfError> {
    let c_name = CString::new(name)
        .map_err(|_| AutoconfError::Environment(format!("Invalid user name '{name}'.")))?;
    let found = with_passwd(|pwd, buf, len, result| {
        // SAFETY: every pointer references a live buffer of the advertised size.
        unsafe { libc::getpwnam_r(c_name.as_ptr(), pwd, buf, len, result) }
    })
    .map_err(|e| AutoconfError::Environment(format!("Failed to look up user '{name}': {e}")))?;
    found.ok_or_else(|| AutoconfError::Environment(format!("Unknown system user '{name}'.")))
}

/// Looks up the account of the effective user of this process.
pub fn current() -> Result<SystemUser, AutoconfError> {
    // SAFETY: geteuid has no preconditions and cannot fail.
    let uid = unsafe { libc::geteuid() };
    let found = with_passwd(|pwd, buf, len, result| {
        // SAFETY: every pointer references a live buffer of the advertised size.
        unsafe { libc::getpwuid_r(uid, pwd, buf, len, result) }
    })
    .map_err(|e| AutoconfError::Environment(format!("Failed to look up uid {uid}: {e}")))?;
    found.ok_or_else(|| AutoconfError::Environment(format!("No passwd entry for uid {uid}.")))
}

/// Runs a `getpw*_r` call, growing the scratch buffer on `ERANGE`.
fn with_passwd<F>(call: F) -> io::Result<Option<SystemUser>>
where
    F: Fn(*mut libc::passwd, *mut libc::c_char, usize, *mut *mut libc::passwd) -> libc::c_int,
{
    let mut size = INITIAL_BUFFER;
    loop {
        // SAFETY: passwd is a plain C struct, all-zero is a valid bit pattern.
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut buf = vec![0 as libc::c_char; size];
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        let rc = call(
            &mut pwd as *mut libc::passwd,
            buf.as_mut_ptr(),
            buf.len(),
            &mut result as *mut *mut libc::passwd,
        );
        if rc == libc::ERANGE && size < MAX_BUFFER {
            size *= 2;
            continue;
        }
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        if result.is_null() {
            return Ok(None);
        }
        // SAFETY: on success the string fields point into `buf`, still alive here.
        let (name, home) = unsafe {
            (
                CStr::from_ptr(pwd.pw_name).to_string_lossy().into_owned(),
                CStr::from_ptr(pwd.pw_dir).to_string_lossy().into_owned(),
            )
        };
        let group = group_name(pwd.pw_gid).unwrap_or_else(|| pwd.pw_gid.to_string());
        return Ok(Some(SystemUser {
            name,
            uid: pwd.pw_uid,
            gid: pwd.pw_gid,
            group,
            home: PathBuf::from(home),
        }));
    }
}

/// Resolves a group id to its name.
pub fn group_name(gid: u32) -> Option<String> {
    let mut size = INITIAL_BUFFER;
    loop {
        // SAFETY: group is a plain C struct, all-zero is a valid bit pattern.
        let mut grp: libc::group = unsafe { std::mem::zeroed() };
        let mut buf = vec![0 as libc::c_char; size];
        let mut result: *mut libc::group = std::ptr::null_mut();
        // SAFETY: every pointer references a live buffer of the advertised size.
        let rc = unsafe { libc::getgrgid_r(gid, &mut grp, buf.as_mut_ptr(), buf.len(), &mut result) };
        if rc == libc::ERANGE && size < MAX_BUFFER {
            size *= 2;
            continue;
        }
        if rc != 0 || result.is_null() {
            return None;
        }
        // SAFETY: gr_name points into `buf`, still alive here.
        let name = unsafe { CStr::from_ptr(grp.gr_name) };
        return Some(name.to_string_lossy().into_owned());
    }
}
