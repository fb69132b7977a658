//! Path resolution for Connect configuration and data files.
//!
//! CONNECT_HOME resolution order:
//! 1. CONNECT_HOME environment variable (if set and non-empty)
//! 2. ~/.connect (default)

use std::env;
use std::io;
use std::path::{Path, PathBuf};

pub const HOME_ENV: &str = "CONNECT_HOME";

#[must_use]
pub fn connect_home() -> Option<PathBuf> {
    if let Ok(home) = env::var(HOME_ENV)
        && !home.trim().is_empty()
    {
        return Some(PathBuf::from(home));
    }
    dirs::home_dir().map(|home| home.join(".connect"))
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    connect_home().map(|home| home.join("config.toml"))
}

/// Durable key-value storage (tokens, pairing code).
#[must_use]
pub fn storage_path() -> Option<PathBuf> {
    connect_home().map(|home| home.join("storage.json"))
}

/// Session-scoped key-value storage (pending redirect).
#[must_use]
pub fn session_path() -> Option<PathBuf> {
    connect_home().map(|home| home.join("session.json"))
}

#[must_use]
pub fn log_path() -> Option<PathBuf> {
    connect_home().map(|home| home.join("logs").join("connect.log"))
}

/// Tightens a directory we own to 0700 if group/other bits are set.
pub fn restrict_dir_permissions(dir: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::fs;
        use std::os::unix::fs::{MetadataExt, PermissionsExt};

        let metadata = fs::metadata(dir)?;
        // Only modify permissions if we own the directory
        let our_uid = unsafe { libc::getuid() };
        if metadata.uid() == our_uid {
            let mode = metadata.permissions().mode() & 0o777;
            if mode & 0o077 != 0 {
                fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
    Ok(())
}
