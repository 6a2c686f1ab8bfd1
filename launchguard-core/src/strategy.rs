//! Trust strategies, one per integrity level
//!
//! The orchestrator picks exactly one [`IntegrityStrategy`] per invocation.

use crate::checksum;
use crate::config::{env_vars, IntegrityLevel};
use crate::outcome::VerificationOutcome;
use crate::remote::RemoteVerifier;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Marker recording that the signature fallback notice has been shown
pub const SIGNATURE_NOTICE_MARKER: &str = "signature-fallback-notice";

/// A way of deciding whether the tracked files can be trusted
#[async_trait]
pub trait IntegrityStrategy: Send + Sync {
    /// The level this strategy implements
    fn level(&self) -> IntegrityLevel;

    async fn verify(&self) -> VerificationOutcome;
}

/// Verify against the local checksum manifest
pub struct ChecksumStrategy<'a> {
    root: &'a Path,
    manifest_path: &'a Path,
}

impl<'a> ChecksumStrategy<'a> {
    pub fn new(root: &'a Path, manifest_path: &'a Path) -> Self {
        Self { root, manifest_path }
    }
}

#[async_trait]
impl IntegrityStrategy for ChecksumStrategy<'_> {
    fn level(&self) -> IntegrityLevel {
        IntegrityLevel::Checksum
    }

    async fn verify(&self) -> VerificationOutcome {
        checksum::verify_manifest_file(self.root, self.manifest_path)
    }
}

/// Reserved for signature verification; runs checksum verification for now
/// and says so.
pub struct SignatureStrategy<'a> {
    fallback: ChecksumStrategy<'a>,
    state_dir: Option<PathBuf>,
}

impl<'a> SignatureStrategy<'a> {
    pub fn new(fallback: ChecksumStrategy<'a>, state_dir: Option<PathBuf>) -> Self {
        Self { fallback, state_dir }
    }

    /// Warn the first time, then only at debug level.
    ///
    /// Returns whether the warning was emitted.
    pub fn announce_fallback(&self) -> bool {
        const NOTICE: &str =
            "Signature verification is not implemented yet; falling back to checksum verification";

        let Some(state_dir) = &self.state_dir else {
            warn!("{}. (Set {} to show this only once.)", NOTICE, env_vars::STATE_DIR);
            return true;
        };

        let marker = state_dir.join(SIGNATURE_NOTICE_MARKER);
        if marker.exists() {
            debug!("{}", NOTICE);
            return false;
        }

        warn!("{}", NOTICE);
        let recorded =
            std::fs::create_dir_all(state_dir).and_then(|_| std::fs::write(&marker, NOTICE));
        if let Err(e) = recorded {
            warn!(
                "Could not record the notice in {} ({}); it will be shown again next run",
                marker.display(),
                e
            );
        }
        true
    }
}

#[async_trait]
impl IntegrityStrategy for SignatureStrategy<'_> {
    fn level(&self) -> IntegrityLevel {
        IntegrityLevel::Signature
    }

    async fn verify(&self) -> VerificationOutcome {
        self.announce_fallback();
        self.fallback.verify().await
    }
}

/// Re-fetch the trust anchor and reconcile against it
pub struct RemoteTrustStrategy<'a> {
    verifier: RemoteVerifier<'a>,
}

impl<'a> RemoteTrustStrategy<'a> {
    pub fn new(verifier: RemoteVerifier<'a>) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl IntegrityStrategy for RemoteTrustStrategy<'_> {
    fn level(&self) -> IntegrityLevel {
        IntegrityLevel::RemoteTrust
    }

    async fn verify(&self) -> VerificationOutcome {
        self.verifier.reconcile_with_remote().await
    }
}

/// Skip every check
pub struct DisabledStrategy;

#[async_trait]
impl IntegrityStrategy for DisabledStrategy {
    fn level(&self) -> IntegrityLevel {
        IntegrityLevel::Disabled
    }

    async fn verify(&self) -> VerificationOutcome {
        warn!("Integrity checks are DISABLED; the launcher scripts are not verified");
        VerificationOutcome::Skipped {
            reason: "integrity checks disabled".to_string(),
        }
    }
}
