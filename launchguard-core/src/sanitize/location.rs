//! Execution location and permission checks for the launcher script

use crate::error::SanitizationError;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Shared temporary locations any local user can write to
pub const WORLD_WRITABLE_TEMP_ROOTS: &[&str] = &[
    "/tmp",
    "/var/tmp",
    "/dev/shm",
    "/run/shm",
    "/private/tmp",
    "/private/var/tmp",
];

const GROUP_OR_OTHER_WRITE: u32 = 0o022;

/// Owner and permission bits of a filesystem object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStatus {
    pub mode: u32,
    pub uid: u32,
}

impl FileStatus {
    pub fn writable_by_others(&self) -> bool {
        self.mode & GROUP_OR_OTHER_WRITE != 0
    }
}

/// Host facts the sanitizer needs, injectable for tests
pub trait HostInspector {
    fn exists(&self, path: &Path) -> bool;
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
    /// `Ok(None)` when the platform has no owner/mode model
    fn file_status(&self, path: &Path) -> io::Result<Option<FileStatus>>;
    fn effective_uid(&self) -> Option<u32>;
}

/// The real host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInspector;

impl HostInspector for SystemInspector {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::canonicalize(path)
    }

    #[cfg(unix)]
    fn file_status(&self, path: &Path) -> io::Result<Option<FileStatus>> {
        use std::os::unix::fs::MetadataExt;
        let meta = std::fs::metadata(path)?;
        Ok(Some(FileStatus {
            mode: meta.mode() & 0o7777,
            uid: meta.uid(),
        }))
    }

    #[cfg(not(unix))]
    fn file_status(&self, path: &Path) -> io::Result<Option<FileStatus>> {
        std::fs::metadata(path)?;
        Ok(None)
    }

    #[cfg(unix)]
    fn effective_uid(&self) -> Option<u32> {
        // SAFETY: geteuid has no preconditions and cannot fail
        Some(unsafe { libc::geteuid() })
    }

    #[cfg(not(unix))]
    fn effective_uid(&self) -> Option<u32> {
        None
    }
}

/// Result of the permission check when it passes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionCheck {
    /// False when the platform offers nothing to check
    pub checked: bool,
    pub warnings: Vec<String>,
}

/// Resolve the script to its canonical path
pub fn resolve_script(
    script: &Path,
    inspector: &dyn HostInspector,
) -> Result<PathBuf, SanitizationError> {
    inspector
        .canonicalize(script)
        .map_err(|e| SanitizationError::ScriptUnreadable {
            path: script.to_path_buf(),
            source: e,
        })
}

/// Reject a script whose directory lies under a world-writable temp root
pub fn check_location(
    resolved_script: &Path,
    temp_roots: &[PathBuf],
    inspector: &dyn HostInspector,
) -> Result<(), SanitizationError> {
    let script_dir = resolved_script.parent().unwrap_or(resolved_script);

    for root in temp_roots {
        // /tmp is itself a symlink on macOS, so compare against both spellings
        let canonical_root = inspector.canonicalize(root).unwrap_or_else(|_| root.clone());
        if script_dir.starts_with(root) || script_dir.starts_with(&canonical_root) {
            return Err(SanitizationError::UnsafeLocation {
                script_dir: script_dir.to_path_buf(),
                temp_root: root.clone(),
            });
        }
    }

    debug!("Script location ok: {}", script_dir.display());
    Ok(())
}

/// Reject a script others can modify unless this process owns it.
///
/// A group/world-writable parent directory only produces a warning: the
/// script itself is safe, but siblings it sources might not be.
pub fn check_permissions(
    resolved_script: &Path,
    inspector: &dyn HostInspector,
) -> Result<PermissionCheck, SanitizationError> {
    let unreadable = |e| SanitizationError::ScriptUnreadable {
        path: resolved_script.to_path_buf(),
        source: e,
    };

    let Some(status) = inspector.file_status(resolved_script).map_err(unreadable)? else {
        debug!("No permission model on this platform; skipping permission check");
        return Ok(PermissionCheck::default());
    };
    let process_uid = inspector.effective_uid();

    if status.writable_by_others() && process_uid != Some(status.uid) {
        return Err(SanitizationError::UnsafePermissions {
            path: resolved_script.to_path_buf(),
            mode: status.mode,
            owner_uid: status.uid,
            process_uid: process_uid.unwrap_or(u32::MAX),
        });
    }

    let mut warnings = Vec::new();
    if let Some(dir) = resolved_script.parent() {
        if let Ok(Some(dir_status)) = inspector.file_status(dir) {
            if dir_status.writable_by_others() {
                warnings.push(format!(
                    "Directory {} is writable by group or others (mode {:04o}); \
                     files next to the launcher could be replaced. Consider: chmod go-w {}",
                    dir.display(),
                    dir_status.mode,
                    dir.display()
                ));
            }
        }
    }

    Ok(PermissionCheck { checked: true, warnings })
}
