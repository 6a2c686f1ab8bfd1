//! Error types with clear, actionable messages

use std::path::PathBuf;
use thiserror::Error;

/// Failures that make the environment unsafe to continue in.
///
/// Every variant is fatal: the caller must terminate the process.
#[derive(Error, Debug)]
pub enum SanitizationError {
    /// The launcher lives under a shared, world-writable temporary directory
    #[error(
        "Refusing to run from a world-writable temporary location!\n\n\
         Script directory: {script_dir}\n\
         Temporary root:   {temp_root}\n\n\
         Anything under {temp_root} can be planted or replaced by any local user.\n\n\
         To fix this, move the launcher out of the shared temporary directory, e.g.:\
         \n  git clone <repository> ~/yollayah"
    )]
    UnsafeLocation {
        script_dir: PathBuf,
        temp_root: PathBuf,
    },

    /// The launcher can be modified by someone other than its owner
    #[error(
        "Launcher script is writable by other users!\n\n\
         Script: {path}\n\
         Mode:   {mode:04o} (owner uid {owner_uid}, running as uid {process_uid})\n\n\
         To fix this, remove group/other write permission:\
         \n  chmod go-w {path}"
    )]
    UnsafePermissions {
        path: PathBuf,
        mode: u32,
        owner_uid: u32,
        process_uid: u32,
    },

    /// The launcher path could not be inspected at all
    #[error("Failed to inspect launcher script: {path}")]
    ScriptUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Integrity subsystem errors
#[derive(Error, Debug)]
pub enum IntegrityError {
    /// Environment sanitization failed (always fatal)
    #[error(transparent)]
    Sanitization(#[from] SanitizationError),

    /// No manifest has been generated yet
    #[error(
        "No checksum manifest found at {path}\n\n\
         To record the current scripts as trusted, run:\
         \n  launchguard generate"
    )]
    ManifestNotFound { path: PathBuf },

    /// Failed to read the manifest file
    #[error("Failed to read checksum manifest from {path}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest exists but is not well formed
    #[error(
        "Checksum manifest {path} is malformed at line {line}: {reason}\n\n\
         Regenerate it with:\
         \n  launchguard generate"
    )]
    ManifestParse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Failed to write the manifest file
    #[error("Failed to write checksum manifest to {path}")]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A tracked file could not be hashed while generating
    #[error("Failed to hash {path} while generating the manifest")]
    HashFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file selector pattern is not a valid glob
    #[error("Invalid file selector pattern '{pattern}'")]
    Selector {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// Walking the project tree failed
    #[error("Failed to walk project tree under {root}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// A selected file name cannot be recorded in the manifest unchanged
    #[error("Cannot track {path}: {reason}\n\nRename the file or exclude it from the tracked set")]
    UntrackablePath { path: PathBuf, reason: &'static str },

    /// Failed to read the optional YAML configuration file
    #[error("Failed to read integrity configuration from {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The YAML configuration file could not be parsed
    #[error("Failed to parse integrity configuration {path}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// Remote trust was selected without a trust anchor
    #[error(
        "Remote trust level selected but no trust anchor is configured.\n\n\
         Set the remote repository with:\
         \n  YOLLAYAH_TRUST_REMOTE=<url> YOLLAYAH_TRUST_BRANCH=<ref>"
    )]
    NoTrustAnchor,

    /// The version-control client failed
    #[error("git {operation} failed: {reason}")]
    Vcs { operation: String, reason: String },

    /// The remote fetch did not finish in time
    #[error("Fetching the trust anchor timed out after {seconds}s")]
    RemoteTimeout { seconds: u64 },

    /// Applying remote contents to the working copy failed
    #[error("Failed to reconcile {path} with the trust anchor")]
    Reconcile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IntegrityError {
    /// Log security-critical errors on the `security` target
    pub fn log_if_security_critical(&self) {
        if let IntegrityError::Sanitization(inner) = self {
            inner.log_if_security_critical();
        }
    }
}

impl SanitizationError {
    pub fn log_if_security_critical(&self) {
        match self {
            SanitizationError::UnsafeLocation { .. }
            | SanitizationError::UnsafePermissions { .. } => {
                tracing::error!(target: "security", "SANITIZATION FAILURE: {}", self);
            }
            SanitizationError::ScriptUnreadable { .. } => {}
        }
    }
}
