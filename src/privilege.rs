//! Dropping set-user-ID privileges
//!
//! The namespace configuration may only be readable by an administrative
//! account, in which case the binary is installed set-user-ID. Once the
//! configuration is loaded the crawl runs as the invoking user.

use crate::error::ConfigError;
#[cfg(unix)]
use std::io;
#[cfg(unix)]
use tracing::info;

/// Lower the effective group and user ids to the real ones.
///
/// Returns whether anything changed. The group goes first: after the user id
/// is lowered the process may no longer change its group.
#[cfg(unix)]
pub fn drop_privileges() -> Result<bool, ConfigError> {
    // SAFETY: the id getters cannot fail and touch no memory
    let (uid, euid, gid, egid) = unsafe { (libc::getuid(), libc::geteuid(), libc::getgid(), libc::getegid()) };
    if uid == euid && gid == egid {
        return Ok(false);
    }

    if gid != egid && unsafe { libc::setegid(gid) } != 0 {
        return Err(ConfigError::Privilege {
            what: "GID",
            id: gid,
            reason: io::Error::last_os_error().to_string(),
        });
    }
    if uid != euid && unsafe { libc::seteuid(uid) } != 0 {
        return Err(ConfigError::Privilege {
            what: "UID",
            id: uid,
            reason: io::Error::last_os_error().to_string(),
        });
    }

    info!(uid, gid, "Dropped effective privileges");
    Ok(true)
}

#[cfg(not(unix))]
pub fn drop_privileges() -> Result<bool, ConfigError> {
    Ok(false)
}
