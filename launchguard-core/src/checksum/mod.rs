//! Checksum manifest engine
//!
//! `generate` records the tracked file set; `verify` compares the working
//! tree against a recorded manifest.
//!
//! Known limitation: the manifest normally lives next to the files it
//! protects, so anyone able to edit a tracked script can usually rewrite the
//! manifest too. This catches accidental corruption and unsophisticated
//! tampering only. Files on disk that the manifest does not list are not
//! reported; the manifest enumerates a protected subset, not a directory
//! listing.

pub mod hasher;
pub mod manifest;
pub mod selector;

pub use manifest::Manifest;
pub use selector::FileSelector;

use crate::error::IntegrityError;
use crate::outcome::{VerificationFinding, VerificationOutcome};
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, warn};

/// Operator-facing statement of what checksum protection does not cover
pub const KNOWN_LIMITATION: &str = "The checksum manifest shares a trust boundary with the \
    scripts it protects: anyone who can modify a tracked script can usually rewrite the manifest \
    as well. It detects accidental corruption and unsophisticated tampering, not a determined \
    local attacker.";

/// Hash every selected file under `root` into a fresh manifest
pub fn generate(root: &Path, selector: &FileSelector) -> Result<Manifest, IntegrityError> {
    info!("Generating checksum manifest for {}", root.display());

    let mut manifest = Manifest::new();
    for (relative, absolute) in selector.select(root)? {
        let digest = hasher::hash_file(&absolute).map_err(|e| IntegrityError::HashFailed {
            path: absolute.clone(),
            source: e,
        })?;
        debug!("{}  {}", digest, relative);
        manifest.insert(relative, digest);
    }

    if manifest.is_empty() {
        warn!("No files matched the selector; the manifest protects nothing");
    }

    Ok(manifest)
}

/// Check one recorded path against the working tree
pub fn check_entry(root: &Path, relative: &str, expected: &str) -> VerificationFinding {
    let path = root.join(relative);

    match std::fs::symlink_metadata(&path) {
        Err(e) if e.kind() == ErrorKind::NotFound => return VerificationFinding::missing(relative),
        Err(e) => return VerificationFinding::unreadable(relative, e.to_string()),
        Ok(meta) if meta.file_type().is_symlink() => {
            return VerificationFinding::unreadable(
                relative,
                "tracked path has been replaced by a symbolic link",
            )
        }
        Ok(meta) if meta.is_dir() => {
            return VerificationFinding::unreadable(relative, "tracked path is a directory")
        }
        Ok(_) => {}
    }

    match hasher::hash_file(&path) {
        Ok(actual) if actual == expected => VerificationFinding::matched(relative),
        Ok(actual) => VerificationFinding::mismatched(relative, expected, actual),
        Err(e) if e.kind() == ErrorKind::NotFound => VerificationFinding::missing(relative),
        Err(e) => VerificationFinding::unreadable(relative, e.to_string()),
    }
}

/// Check every manifest entry, in path order
pub fn verify_findings(root: &Path, manifest: &Manifest) -> Vec<VerificationFinding> {
    manifest
        .entries
        .iter()
        .map(|(relative, expected)| check_entry(root, relative, expected))
        .collect()
}

/// Verify the working tree against a manifest
pub fn verify(root: &Path, manifest: &Manifest) -> VerificationOutcome {
    debug!("Verifying {} tracked files under {}", manifest.len(), root.display());
    let outcome = VerificationOutcome::from_findings(verify_findings(root, manifest));

    for finding in outcome.findings() {
        tracing::error!(target: "security", "INTEGRITY VIOLATION: {}", finding);
    }

    outcome
}

/// Load the manifest at `manifest_path` and verify against it.
///
/// A manifest that is missing or unreadable means no judgment was possible,
/// so the outcome is inconclusive rather than verified.
pub fn verify_manifest_file(root: &Path, manifest_path: &Path) -> VerificationOutcome {
    match Manifest::load(manifest_path) {
        Ok(manifest) => {
            if manifest.is_empty() {
                warn!("Checksum manifest {} has no entries", manifest_path.display());
            }
            verify(root, &manifest)
        }
        Err(e) => {
            warn!("Cannot verify checksums: {}", e);
            VerificationOutcome::inconclusive(e.to_string())
        }
    }
}
