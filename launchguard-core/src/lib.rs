//! launchguard - integrity verification and environment hardening that runs
//! before the Yollayah launcher sources any of its modules.
//!
//! The [`orchestrator::Orchestrator`] is the single entry point: it always
//! sanitizes the environment first, then dispatches to exactly one trust
//! strategy selected by [`config::IntegrityLevel`].

pub mod checksum;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod outcome;
pub mod remote;
pub mod sanitize;
pub mod strategy;

pub use config::{IntegrityConfig, IntegrityLevel};
pub use error::{IntegrityError, SanitizationError};
pub use orchestrator::{Orchestrator, RunReport, VerificationRun};
pub use outcome::{Verdict, VerificationFinding, VerificationOutcome};
pub use sanitize::{SanitizationReport, SanitizedEnvironment};

/// Manifest format version written into generated manifests
pub const MANIFEST_VERSION: u32 = 1;
