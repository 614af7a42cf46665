//! Filesystem probes used by the key provider fallback logic.

use std::path::Path;

/// Checks if the specified file exists.
pub(crate) fn file_exists(path: &Path) -> bool {
    path.exists()
}

/// Checks if the specified path is writable by the current user.
#[cfg(unix)]
pub(crate) fn is_writable(path: &Path) -> bool {
    nix::unistd::access(path, nix::unistd::AccessFlags::W_OK).is_ok()
}

/// Checks if the specified path is writable by the current user.
#[cfg(not(unix))]
pub(crate) fn is_writable(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|meta| !meta.permissions().readonly())
}
