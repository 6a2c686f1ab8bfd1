//! Verification findings, outcomes and the verdicts derived from them

use crate::config::FailurePolicy;
use serde::Serialize;
use std::fmt;

/// Process exit codes the launcher can branch on without parsing output
pub mod exit_code {
    /// Verified, proceed, or an informational command completed
    pub const OK: i32 = 0;
    /// Unexpected error (I/O while generating, bad configuration file, ...)
    pub const ERROR: i32 = 1;
    /// The environment could not be made safe
    pub const SANITIZATION_FAILED: i32 = 3;
    /// Verification ran and found tampering
    pub const TAMPERED: i32 = 4;
    /// Verification could not reach a judgment
    pub const INCONCLUSIVE: i32 = 5;
}

/// Result of checking one tracked path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Finding {
    Matched,
    Mismatched { expected: String, actual: String },
    Missing,
    Unreadable { reason: String },
}

/// A finding scoped to a single tracked path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationFinding {
    pub path: String,
    #[serde(flatten)]
    pub finding: Finding,
}

impl VerificationFinding {
    pub fn matched(path: impl Into<String>) -> Self {
        Self { path: path.into(), finding: Finding::Matched }
    }

    pub fn mismatched(
        path: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            finding: Finding::Mismatched {
                expected: expected.into(),
                actual: actual.into(),
            },
        }
    }

    pub fn missing(path: impl Into<String>) -> Self {
        Self { path: path.into(), finding: Finding::Missing }
    }

    pub fn unreadable(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            finding: Finding::Unreadable { reason: reason.into() },
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self.finding, Finding::Matched)
    }
}

impl fmt::Display for VerificationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.finding {
            Finding::Matched => write!(f, "{}: ok", self.path),
            Finding::Mismatched { expected, actual } => write!(
                f,
                "{}: digest mismatch (expected {}, found {})",
                self.path, expected, actual
            ),
            Finding::Missing => write!(f, "{}: missing", self.path),
            Finding::Unreadable { reason } => write!(f, "{}: unreadable ({})", self.path, reason),
        }
    }
}

/// Overall result of one verification run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// Every tracked path matched
    Verified { checked: usize },
    /// At least one tracked path did not match; only non-matching findings are kept
    Tampered { findings: Vec<VerificationFinding> },
    /// A judgment could not be reached (I/O, network, missing manifest)
    Inconclusive { reason: String },
    /// Checks were disabled for this run
    Skipped { reason: String },
}

impl VerificationOutcome {
    /// Collapse per-path findings into an outcome.
    ///
    /// An empty tracked set protects nothing and is inconclusive.
    pub fn from_findings(findings: Vec<VerificationFinding>) -> Self {
        if findings.is_empty() {
            return VerificationOutcome::inconclusive(
                "No tracked files were checked; regenerate the manifest with \
                 'launchguard generate' or adjust the include patterns",
            );
        }
        let checked = findings.len();
        let failures: Vec<_> = findings.into_iter().filter(|f| !f.is_matched()).collect();
        if failures.is_empty() {
            VerificationOutcome::Verified { checked }
        } else {
            VerificationOutcome::Tampered { findings: failures }
        }
    }

    pub fn inconclusive(reason: impl Into<String>) -> Self {
        VerificationOutcome::Inconclusive { reason: reason.into() }
    }

    /// Non-matching findings (empty unless tampered)
    pub fn findings(&self) -> &[VerificationFinding] {
        match self {
            VerificationOutcome::Tampered { findings } => findings,
            _ => &[],
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationOutcome::Verified { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            VerificationOutcome::Verified { .. } => "verified",
            VerificationOutcome::Tampered { .. } => "tampered",
            VerificationOutcome::Inconclusive { .. } => "inconclusive",
            VerificationOutcome::Skipped { .. } => "skipped",
        }
    }
}

/// What the launcher should do with an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Proceed,
    Warn,
    Abort,
}

impl Verdict {
    /// Apply the configured policies to an outcome.
    ///
    /// A skipped run always warns: it must never look like a verified one.
    pub fn for_outcome(
        outcome: &VerificationOutcome,
        on_tampered: FailurePolicy,
        on_inconclusive: FailurePolicy,
    ) -> Self {
        match outcome {
            VerificationOutcome::Verified { .. } => Verdict::Proceed,
            VerificationOutcome::Skipped { .. } => Verdict::Warn,
            VerificationOutcome::Tampered { .. } => on_tampered.into(),
            VerificationOutcome::Inconclusive { .. } => on_inconclusive.into(),
        }
    }

    /// Exit code for this verdict
    pub fn exit_code(&self, outcome: &VerificationOutcome) -> i32 {
        match (self, outcome) {
            (Verdict::Proceed | Verdict::Warn, _) => exit_code::OK,
            (Verdict::Abort, VerificationOutcome::Tampered { .. }) => exit_code::TAMPERED,
            (Verdict::Abort, VerificationOutcome::Inconclusive { .. }) => exit_code::INCONCLUSIVE,
            (Verdict::Abort, _) => exit_code::ERROR,
        }
    }
}

impl From<FailurePolicy> for Verdict {
    fn from(policy: FailurePolicy) -> Self {
        match policy {
            FailurePolicy::Abort => Verdict::Abort,
            FailurePolicy::Warn => Verdict::Warn,
        }
    }
}
