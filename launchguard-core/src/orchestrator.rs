//! Level orchestrator
//!
//! Owns the resolved [`IntegrityConfig`], sanitizes the inherited environment
//! first on every path, then does exactly one of: run the selected trust
//! strategy, regenerate the manifest, or summarize the current state.

use crate::checksum::{self, FileSelector, Manifest, KNOWN_LIMITATION};
use crate::config::{FailurePolicy, IntegrityConfig, IntegrityLevel, OperatingMode};
use crate::error::{IntegrityError, SanitizationError};
use crate::outcome::{Verdict, VerificationOutcome};
use crate::remote::{GitCli, RemoteVerifier, VcsClient};
use crate::sanitize::{
    self, Environment, HostInspector, SanitizationReport, SanitizedEnvironment, SanitizerOptions,
    SystemInspector,
};
use crate::strategy::{
    ChecksumStrategy, DisabledStrategy, IntegrityStrategy, RemoteTrustStrategy, SignatureStrategy,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// Result of a verification run
#[derive(Debug, Clone)]
pub struct VerificationRun {
    pub level: IntegrityLevel,
    pub outcome: VerificationOutcome,
    pub verdict: Verdict,
    pub sanitized: SanitizedEnvironment,
    /// Configuration fallbacks and weakened settings, shown with the result
    pub config_warnings: Vec<String>,
}

impl VerificationRun {
    pub fn exit_code(&self) -> i32 {
        self.verdict.exit_code(&self.outcome)
    }
}

/// Result of regenerating the manifest
#[derive(Debug, Clone, Serialize)]
pub struct GenerateSummary {
    pub manifest_path: PathBuf,
    pub files: usize,
    pub generated_at: Option<DateTime<Utc>>,
    pub known_limitation: &'static str,
    pub sanitization: SanitizationReport,
}

/// Configuration and manifest summary for the status view
#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub level: IntegrityLevel,
    pub root: PathBuf,
    pub script_path: PathBuf,
    pub manifest_path: PathBuf,
    pub manifest_present: bool,
    pub tracked_files: Option<usize>,
    pub generated_at: Option<DateTime<Utc>>,
    /// Why the manifest could not be summarized, if it exists but is unusable
    pub manifest_error: Option<String>,
    pub trust_anchor: Option<String>,
    pub reconcile: bool,
    pub on_tampered: FailurePolicy,
    pub on_inconclusive: FailurePolicy,
    pub config_warnings: Vec<String>,
    pub known_limitation: &'static str,
    pub sanitization: SanitizationReport,
}

/// What one invocation produced, by operating mode
#[derive(Debug, Clone)]
pub enum RunReport {
    Verification(VerificationRun),
    Generated(GenerateSummary),
    Status(Box<StatusSummary>),
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunReport::Verification(run) => run.exit_code(),
            RunReport::Generated(_) | RunReport::Status(_) => crate::outcome::exit_code::OK,
        }
    }
}

/// Sanitizes, then dispatches one integrity level or operating mode
pub struct Orchestrator {
    config: IntegrityConfig,
    options: SanitizerOptions,
    inspector: Box<dyn HostInspector + Send + Sync>,
    vcs: Box<dyn VcsClient>,
}

impl Orchestrator {
    pub fn new(config: IntegrityConfig) -> Self {
        Self {
            config,
            options: SanitizerOptions::default(),
            inspector: Box::new(SystemInspector),
            vcs: Box::new(GitCli::default()),
        }
    }

    pub fn with_sanitizer_options(mut self, options: SanitizerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_inspector(mut self, inspector: impl HostInspector + Send + Sync + 'static) -> Self {
        self.inspector = Box::new(inspector);
        self
    }

    pub fn with_vcs(mut self, vcs: impl VcsClient + 'static) -> Self {
        self.vcs = Box::new(vcs);
        self
    }

    pub fn config(&self) -> &IntegrityConfig {
        &self.config
    }

    /// Run the sanitizer alone
    pub fn sanitize(
        &self,
        inherited: &Environment,
    ) -> Result<SanitizedEnvironment, SanitizationError> {
        let script = &self.config.script_path;
        sanitize::sanitize(inherited, script, &self.options, self.inspector.as_ref())
            .inspect_err(|e| e.log_if_security_critical())
    }

    /// Dispatch on the configured operating mode
    pub async fn run(&self, inherited: &Environment) -> Result<RunReport, IntegrityError> {
        match self.config.mode {
            OperatingMode::Verify => {
                self.run_verification(inherited).await.map(RunReport::Verification)
            }
            OperatingMode::Generate => self.generate(inherited).map(RunReport::Generated),
            OperatingMode::Status => self.status(inherited).map(|s| RunReport::Status(Box::new(s))),
        }
    }

    /// Sanitize, then run the strategy for the configured level.
    ///
    /// Sanitization runs even when checks are disabled, and its failure is
    /// returned as an error.
    pub async fn run_verification(
        &self,
        inherited: &Environment,
    ) -> Result<VerificationRun, IntegrityError> {
        let sanitized = self.sanitize(inherited)?;
        let config = &self.config;

        let checksum = ChecksumStrategy::new(&config.root, &config.manifest_path);
        let selector;
        let strategy: Box<dyn IntegrityStrategy + '_> = match config.level {
            IntegrityLevel::RemoteTrust => {
                selector = self.selector()?;
                Box::new(RemoteTrustStrategy::new(RemoteVerifier {
                    root: &config.root,
                    selector: &selector,
                    settings: &config.remote,
                    backup_dir: &config.backup_dir,
                    env: sanitized.env(),
                    client: self.vcs.as_ref(),
                }))
            }
            IntegrityLevel::Checksum => Box::new(checksum),
            IntegrityLevel::Signature => {
                Box::new(SignatureStrategy::new(checksum, config.state_dir.clone()))
            }
            IntegrityLevel::Disabled => Box::new(DisabledStrategy),
        };

        info!("Integrity level: {}", strategy.level());
        let outcome = strategy.verify().await;
        drop(strategy);

        let verdict = Verdict::for_outcome(&outcome, config.on_tampered, config.on_inconclusive);
        match (&outcome, verdict) {
            (VerificationOutcome::Verified { checked }, _) => {
                info!("Integrity verified ({} files)", checked)
            }
            (_, Verdict::Warn) => {
                warn!("Integrity {}; continuing because policy is 'warn'", outcome.label())
            }
            _ => {}
        }

        Ok(VerificationRun {
            level: config.level,
            outcome,
            verdict,
            sanitized,
            config_warnings: config.warnings.clone(),
        })
    }

    /// Sanitize, hash the tracked set and write the manifest
    pub fn generate(&self, inherited: &Environment) -> Result<GenerateSummary, IntegrityError> {
        let sanitized = self.sanitize(inherited)?;

        let manifest = checksum::generate(&self.config.root, &self.selector()?)?;
        manifest.save(&self.config.manifest_path)?;

        info!(
            "Wrote {} entries to {}",
            manifest.len(),
            self.config.manifest_path.display()
        );
        warn!("{}", KNOWN_LIMITATION);

        Ok(GenerateSummary {
            manifest_path: self.config.manifest_path.clone(),
            files: manifest.len(),
            generated_at: manifest.generated_at,
            known_limitation: KNOWN_LIMITATION,
            sanitization: sanitized.into_report(),
        })
    }

    /// Sanitize and summarize configuration and manifest state
    pub fn status(&self, inherited: &Environment) -> Result<StatusSummary, IntegrityError> {
        let sanitized = self.sanitize(inherited)?;
        let config = &self.config;

        let manifest_present = config.manifest_path.exists();
        let (tracked_files, generated_at, manifest_error) = if manifest_present {
            match Manifest::load(&config.manifest_path) {
                Ok(manifest) => (Some(manifest.len()), manifest.generated_at, None),
                Err(e) => (None, None, Some(e.to_string())),
            }
        } else {
            (None, None, None)
        };

        Ok(StatusSummary {
            level: config.level,
            root: config.root.clone(),
            script_path: config.script_path.clone(),
            manifest_path: config.manifest_path.clone(),
            manifest_present,
            tracked_files,
            generated_at,
            manifest_error,
            trust_anchor: config.remote.anchor.as_ref().map(ToString::to_string),
            reconcile: config.remote.reconcile,
            on_tampered: config.on_tampered,
            on_inconclusive: config.on_inconclusive,
            config_warnings: config.warnings.clone(),
            known_limitation: KNOWN_LIMITATION,
            sanitization: sanitized.into_report(),
        })
    }

    fn selector(&self) -> Result<FileSelector, IntegrityError> {
        FileSelector::new(&self.config.include, &self.config.exclude)
    }
}
