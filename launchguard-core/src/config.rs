//! Integrity configuration
//!
//! Configuration is resolved once at startup into an [`IntegrityConfig`] that
//! is handed to the orchestrator. Nothing below this module reads the process
//! environment on its own.
//!
//! Resolution order (later wins):
//! 1. Built-in defaults
//! 2. `<root>/.yollayah/integrity.yml` (optional)
//! 3. `YOLLAYAH_*` environment variables
//! 4. CLI flags (applied by the caller through the setters)

use crate::checksum::selector::{DEFAULT_EXCLUDES, DEFAULT_INCLUDES};
use crate::error::IntegrityError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable names understood by [`IntegrityConfig::apply_env`]
pub mod env_vars {
    pub const LEVEL: &str = "YOLLAYAH_INTEGRITY_LEVEL";
    pub const SKIP: &str = "YOLLAYAH_SKIP_INTEGRITY";
    pub const GENERATE: &str = "YOLLAYAH_GENERATE_CHECKSUMS";
    pub const STATUS: &str = "YOLLAYAH_INTEGRITY_STATUS";
    pub const ROOT: &str = "YOLLAYAH_ROOT";
    pub const SCRIPT_PATH: &str = "YOLLAYAH_SCRIPT_PATH";
    pub const MANIFEST: &str = "YOLLAYAH_MANIFEST";
    pub const TRUST_REMOTE: &str = "YOLLAYAH_TRUST_REMOTE";
    pub const TRUST_BRANCH: &str = "YOLLAYAH_TRUST_BRANCH";
    pub const TRUST_TIMEOUT: &str = "YOLLAYAH_TRUST_TIMEOUT";
    pub const TRUST_RECONCILE: &str = "YOLLAYAH_TRUST_RECONCILE";
    pub const ON_TAMPERED: &str = "YOLLAYAH_ON_TAMPERED";
    pub const ON_INCONCLUSIVE: &str = "YOLLAYAH_ON_INCONCLUSIVE";
    pub const STATE_DIR: &str = "YOLLAYAH_STATE_DIR";
}

/// Directory under the project root holding integrity files
pub const INTEGRITY_DIR: &str = ".yollayah";
/// Default manifest file name inside [`INTEGRITY_DIR`]
pub const MANIFEST_FILE: &str = "checksums.sha256";
/// Optional YAML configuration file inside [`INTEGRITY_DIR`]
pub const CONFIG_FILE: &str = "integrity.yml";

const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BRANCH: &str = "main";

/// The trust strategy used for one invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntegrityLevel {
    /// Re-fetch the trust anchor and reconcile against it
    RemoteTrust,
    /// Verify against the local checksum manifest
    #[default]
    Checksum,
    /// Reserved for signature verification; currently runs checksum verification
    Signature,
    /// Skip all checks (sanitization still runs)
    Disabled,
}

impl FromStr for IntegrityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" | "remote-trust" | "remote_trust" | "paranoid" => {
                Ok(IntegrityLevel::RemoteTrust)
            }
            "checksum" | "default" => Ok(IntegrityLevel::Checksum),
            "signature" | "signed" => Ok(IntegrityLevel::Signature),
            "disabled" | "off" | "none" => Ok(IntegrityLevel::Disabled),
            other => Err(format!(
                "unknown integrity level '{other}' \
                 (expected remote, checksum, signature or disabled)"
            )),
        }
    }
}

impl fmt::Display for IntegrityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IntegrityLevel::RemoteTrust => "remote-trust",
            IntegrityLevel::Checksum => "checksum",
            IntegrityLevel::Signature => "signature",
            IntegrityLevel::Disabled => "disabled",
        };
        f.write_str(name)
    }
}

/// How the launcher should react to a non-verified outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Refuse to continue
    #[default]
    Abort,
    /// Print a warning and continue
    Warn,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" | "refuse" | "fail" => Ok(FailurePolicy::Abort),
            "warn" | "continue" => Ok(FailurePolicy::Warn),
            other => Err(format!("unknown failure policy '{other}' (expected abort or warn)")),
        }
    }
}

/// What the invocation does after sanitizing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    /// Run the selected trust strategy
    #[default]
    Verify,
    /// Regenerate the manifest and stop
    Generate,
    /// Print configuration and manifest summary and stop
    Status,
}

/// Remote repository used as ground truth by the remote trust level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustAnchor {
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

impl fmt::Display for TrustAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.url, self.branch)
    }
}

/// Settings for the remote trust level
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteSettings {
    pub anchor: Option<TrustAnchor>,
    /// Upper bound on the fetch; a stalled fetch resolves to inconclusive
    pub timeout: Duration,
    /// Whether divergent local files may be overwritten with remote content
    pub reconcile: bool,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            anchor: None,
            timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
            reconcile: false,
        }
    }
}

/// On-disk YAML configuration. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub level: Option<String>,
    pub manifest: Option<PathBuf>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub on_tampered: Option<String>,
    pub on_inconclusive: Option<String>,
    pub remote: Option<RemoteFileSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteFileSection {
    pub url: Option<String>,
    pub branch: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub reconcile: Option<bool>,
}

impl ConfigFile {
    /// Load the YAML file if present; absence is not an error
    pub fn load(path: &Path) -> Result<Option<Self>, IntegrityError> {
        if !path.exists() {
            debug!("No integrity configuration file at {}", path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| IntegrityError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file = serde_yaml_ng::from_str(&content).map_err(|e| IntegrityError::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(Some(file))
    }
}

/// Fully resolved configuration for one invocation
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityConfig {
    /// Project root the manifest paths are relative to
    pub root: PathBuf,
    /// The launcher script whose location and permissions are checked
    pub script_path: PathBuf,
    pub manifest_path: PathBuf,
    pub level: IntegrityLevel,
    pub mode: OperatingMode,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub remote: RemoteSettings,
    pub on_tampered: FailurePolicy,
    pub on_inconclusive: FailurePolicy,
    /// Where one-time notices are remembered; `None` disables remembering
    pub state_dir: Option<PathBuf>,
    /// Where reconciliation keeps copies of overwritten files
    pub backup_dir: PathBuf,
    /// Configuration problems that fell back to defaults
    pub warnings: Vec<String>,
}

impl IntegrityConfig {
    /// Defaults for a project root and launcher script
    pub fn new(root: impl Into<PathBuf>, script_path: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let integrity_dir = root.join(INTEGRITY_DIR);
        IntegrityConfig {
            manifest_path: integrity_dir.join(MANIFEST_FILE),
            backup_dir: integrity_dir.join("backups"),
            script_path: script_path.into(),
            level: IntegrityLevel::default(),
            mode: OperatingMode::default(),
            include: DEFAULT_INCLUDES.iter().map(|s| s.to_string()).collect(),
            exclude: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            remote: RemoteSettings::default(),
            on_tampered: FailurePolicy::Abort,
            on_inconclusive: FailurePolicy::Abort,
            state_dir: default_state_dir(),
            warnings: Vec::new(),
            root,
        }
    }

    /// Defaults, then the YAML file under the root, then environment variables.
    ///
    /// `lookup` stands in for `std::env::var` so tests never touch the real
    /// environment.
    pub fn load<F>(
        root: impl Into<PathBuf>,
        script_path: impl Into<PathBuf>,
        lookup: F,
    ) -> Result<Self, IntegrityError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(root, script_path);
        let file_path = config.root.join(INTEGRITY_DIR).join(CONFIG_FILE);
        if let Some(file) = ConfigFile::load(&file_path)? {
            debug!("Applying integrity configuration from {}", file_path.display());
            config.apply_file(file);
        }
        config.apply_env(lookup);
        Ok(config)
    }

    /// Overlay values from the YAML configuration file
    pub fn apply_file(&mut self, file: ConfigFile) {
        if let Some(level) = file.level {
            self.set_level_str(&level, "integrity.yml level");
            if self.level == IntegrityLevel::Disabled {
                self.relaxed_by_file("level: disabled");
            }
        }
        if let Some(manifest) = file.manifest {
            self.manifest_path = self.resolve(manifest);
        }
        if let Some(include) = file.include {
            self.include = include;
        }
        if let Some(exclude) = file.exclude {
            self.exclude = exclude;
        }
        if let Some(policy) = file.on_tampered {
            self.on_tampered = self.parse_policy(&policy, "integrity.yml on_tampered");
            if self.on_tampered == FailurePolicy::Warn {
                self.relaxed_by_file("on_tampered: warn");
            }
        }
        if let Some(policy) = file.on_inconclusive {
            self.on_inconclusive = self.parse_policy(&policy, "integrity.yml on_inconclusive");
            if self.on_inconclusive == FailurePolicy::Warn {
                self.relaxed_by_file("on_inconclusive: warn");
            }
        }
        if let Some(remote) = file.remote {
            if let Some(url) = remote.url {
                self.set_anchor(url, remote.branch);
            } else if let (Some(branch), Some(anchor)) =
                (remote.branch, self.remote.anchor.as_mut())
            {
                anchor.branch = branch;
            }
            if let Some(seconds) = remote.timeout_seconds {
                self.set_remote_timeout(seconds);
            }
            if let Some(reconcile) = remote.reconcile {
                self.remote.reconcile = reconcile;
            }
        }
    }

    /// Overlay values from `YOLLAYAH_*` environment variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(level) = get(env_vars::LEVEL) {
            self.set_level_str(&level, env_vars::LEVEL);
        }
        if let Some(manifest) = get(env_vars::MANIFEST) {
            self.manifest_path = self.resolve(PathBuf::from(manifest));
        }
        if let Some(url) = get(env_vars::TRUST_REMOTE) {
            self.set_anchor(url, get(env_vars::TRUST_BRANCH));
        } else if let (Some(branch), Some(anchor)) =
            (get(env_vars::TRUST_BRANCH), self.remote.anchor.as_mut())
        {
            anchor.branch = branch;
        }
        if let Some(raw) = get(env_vars::TRUST_TIMEOUT) {
            match raw.trim().parse::<u64>() {
                Ok(seconds) => self.set_remote_timeout(seconds),
                Err(_) => self.warn(format!(
                    "{}='{}' is not a number of seconds; using {}s",
                    env_vars::TRUST_TIMEOUT,
                    raw,
                    self.remote.timeout.as_secs()
                )),
            }
        }
        if let Some(raw) = get(env_vars::TRUST_RECONCILE) {
            self.remote.reconcile = self.parse_flag(&raw, env_vars::TRUST_RECONCILE);
        }
        if let Some(policy) = get(env_vars::ON_TAMPERED) {
            self.on_tampered = self.parse_policy(&policy, env_vars::ON_TAMPERED);
        }
        if let Some(policy) = get(env_vars::ON_INCONCLUSIVE) {
            self.on_inconclusive = self.parse_policy(&policy, env_vars::ON_INCONCLUSIVE);
        }
        if let Some(dir) = get(env_vars::STATE_DIR) {
            self.state_dir = Some(PathBuf::from(dir));
        }

        // The escape hatch is independent of the level selector and wins over it
        if let Some(raw) = get(env_vars::SKIP) {
            if self.parse_flag(&raw, env_vars::SKIP) {
                self.level = IntegrityLevel::Disabled;
            }
        }

        let generate =
            get(env_vars::GENERATE).is_some_and(|raw| self.parse_flag(&raw, env_vars::GENERATE));
        let status =
            get(env_vars::STATUS).is_some_and(|raw| self.parse_flag(&raw, env_vars::STATUS));
        match (generate, status) {
            (true, true) => {
                self.warn(format!(
                    "{} and {} are mutually exclusive; showing status only",
                    env_vars::GENERATE,
                    env_vars::STATUS
                ));
                self.mode = OperatingMode::Status;
            }
            (true, false) => self.mode = OperatingMode::Generate,
            (false, true) => self.mode = OperatingMode::Status,
            (false, false) => {}
        }
    }

    /// Set the level from user input, falling back to the default with a warning
    pub fn set_level_str(&mut self, raw: &str, source: &str) {
        match raw.parse::<IntegrityLevel>() {
            Ok(level) => self.level = level,
            Err(e) => {
                let fallback = IntegrityLevel::default();
                self.warn(format!("{source}: {e}; falling back to '{fallback}'"));
                self.level = IntegrityLevel::default();
            }
        }
    }

    pub fn set_anchor(&mut self, url: String, branch: Option<String>) {
        self.remote.anchor = Some(TrustAnchor {
            url,
            branch: branch.unwrap_or_else(default_branch),
        });
    }

    pub fn set_remote_timeout(&mut self, seconds: u64) {
        if seconds == 0 {
            self.warn(format!(
                "remote timeout of 0s is not allowed; using {DEFAULT_REMOTE_TIMEOUT_SECS}s"
            ));
            self.remote.timeout = Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS);
        } else {
            self.remote.timeout = Duration::from_secs(seconds);
        }
    }

    fn parse_policy(&mut self, raw: &str, source: &str) -> FailurePolicy {
        raw.parse().unwrap_or_else(|e| {
            self.warn(format!("{source}: {e}; falling back to 'abort'"));
            FailurePolicy::Abort
        })
    }

    fn parse_flag(&mut self, raw: &str, source: &str) -> bool {
        match parse_bool(raw) {
            Some(value) => value,
            None => {
                self.warn(format!("{source}='{raw}' is not a boolean; treating it as false"));
                false
            }
        }
    }

    fn resolve(&self, path: PathBuf) -> PathBuf {
        if path.is_absolute() {
            path
        } else {
            self.root.join(path)
        }
    }

    /// The file sits next to the manifest, so a weakening setting in it is
    /// always reported alongside the verification result
    fn relaxed_by_file(&mut self, setting: &str) {
        let message = format!(
            "{INTEGRITY_DIR}/{CONFIG_FILE} sets '{setting}', weakening integrity checks; \
             make sure this change is yours"
        );
        warn!(target: "security", "{}", message);
        self.warnings.push(message);
    }

    fn warn(&mut self, message: String) {
        warn!("Integrity configuration: {}", message);
        self.warnings.push(message);
    }
}

/// Parse a boolean flag value
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn default_state_dir() -> Option<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "yollayah")?;
    Some(dirs.state_dir().unwrap_or_else(|| dirs.data_local_dir()).to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_level_parse_aliases() {
        assert_eq!("paranoid".parse::<IntegrityLevel>().unwrap(), IntegrityLevel::RemoteTrust);
        assert_eq!("Remote-Trust".parse::<IntegrityLevel>().unwrap(), IntegrityLevel::RemoteTrust);
        assert_eq!("CHECKSUM".parse::<IntegrityLevel>().unwrap(), IntegrityLevel::Checksum);
        assert_eq!("signed".parse::<IntegrityLevel>().unwrap(), IntegrityLevel::Signature);
        assert_eq!("off".parse::<IntegrityLevel>().unwrap(), IntegrityLevel::Disabled);
        assert!("maximum".parse::<IntegrityLevel>().is_err());
    }

    #[test]
    fn test_unset_level_defaults_to_checksum() {
        let mut config = IntegrityConfig::new("/srv/yollayah", "/srv/yollayah/yollayah.sh");
        config.apply_env(lookup(&[]));
        assert_eq!(config.level, IntegrityLevel::Checksum);
        assert_eq!(config.mode, OperatingMode::Verify);
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn test_invalid_level_falls_back_with_warning() {
        let mut config = IntegrityConfig::new("/srv/yollayah", "/srv/yollayah/yollayah.sh");
        config.apply_env(lookup(&[(env_vars::LEVEL, "ultra")]));
        assert_eq!(config.level, IntegrityLevel::Checksum);
        assert_eq!(config.warnings.len(), 1);
        assert!(config.warnings[0].contains("ultra"));
    }

    #[test]
    fn test_skip_flag_overrides_level() {
        let mut config = IntegrityConfig::new("/srv/yollayah", "/srv/yollayah/yollayah.sh");
        config.apply_env(lookup(&[(env_vars::LEVEL, "remote"), (env_vars::SKIP, "1")]));
        assert_eq!(config.level, IntegrityLevel::Disabled);
    }

    #[test]
    fn test_generate_and_status_are_exclusive() {
        let mut config = IntegrityConfig::new("/srv/yollayah", "/srv/yollayah/yollayah.sh");
        config.apply_env(lookup(&[(env_vars::GENERATE, "true")]));
        assert_eq!(config.mode, OperatingMode::Generate);

        let mut both = IntegrityConfig::new("/srv/yollayah", "/srv/yollayah/yollayah.sh");
        both.apply_env(lookup(&[(env_vars::GENERATE, "yes"), (env_vars::STATUS, "yes")]));
        assert_eq!(both.mode, OperatingMode::Status);
        assert_eq!(both.warnings.len(), 1);
    }

    #[test]
    fn test_remote_settings_from_env() {
        let mut config = IntegrityConfig::new("/srv/yollayah", "/srv/yollayah/yollayah.sh");
        config.apply_env(lookup(&[
            (env_vars::TRUST_REMOTE, "https://example.org/yollayah.git"),
            (env_vars::TRUST_TIMEOUT, "5"),
            (env_vars::TRUST_RECONCILE, "on"),
        ]));
        assert_eq!(
            config.remote.anchor,
            Some(TrustAnchor {
                url: "https://example.org/yollayah.git".into(),
                branch: "main".into(),
            })
        );
        assert_eq!(config.remote.timeout, Duration::from_secs(5));
        assert!(config.remote.reconcile);
    }

    #[test]
    fn test_relative_manifest_resolves_against_root() {
        let mut config = IntegrityConfig::new("/srv/yollayah", "/srv/yollayah/yollayah.sh");
        config.apply_env(lookup(&[(env_vars::MANIFEST, "custom/sums.txt")]));
        assert_eq!(config.manifest_path, PathBuf::from("/srv/yollayah/custom/sums.txt"));
    }

    #[test]
    fn test_yaml_file_then_env_precedence() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(INTEGRITY_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(CONFIG_FILE),
            r#"
level: signature
on_inconclusive: warn
include: ["*.sh", "lib/**/*.sh"]
remote:
  url: https://example.org/yollayah.git
  branch: stable
  timeout_seconds: 12
"#,
        )
        .unwrap();

        let script = temp_dir.path().join("yollayah.sh");
        let env = lookup(&[(env_vars::TRUST_BRANCH, "release")]);
        let config = IntegrityConfig::load(temp_dir.path(), &script, env).unwrap();

        assert_eq!(config.level, IntegrityLevel::Signature);
        assert_eq!(config.on_inconclusive, FailurePolicy::Warn);
        assert_eq!(config.on_tampered, FailurePolicy::Abort);
        assert_eq!(config.include, vec!["*.sh".to_string(), "lib/**/*.sh".to_string()]);
        let anchor = config.remote.anchor.unwrap();
        assert_eq!(anchor.branch, "release");
        assert_eq!(config.remote.timeout, Duration::from_secs(12));
        assert_eq!(config.warnings.len(), 1);
        assert!(config.warnings[0].contains("on_inconclusive: warn"));
    }

    #[test]
    fn test_yaml_file_weakening_checks_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(INTEGRITY_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(CONFIG_FILE), "level: disabled\non_tampered: warn\n").unwrap();

        let script = temp_dir.path().join("yollayah.sh");
        let config = IntegrityConfig::load(temp_dir.path(), &script, lookup(&[])).unwrap();

        assert_eq!(config.level, IntegrityLevel::Disabled);
        assert_eq!(config.warnings.len(), 2);
        assert!(config.warnings.iter().any(|w| w.contains("level: disabled")));
        assert!(config.warnings.iter().any(|w| w.contains("on_tampered: warn")));
    }

    #[test]
    fn test_yaml_file_keeping_defaults_is_quiet() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(INTEGRITY_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(CONFIG_FILE), "level: checksum\non_tampered: abort\n").unwrap();

        let script = temp_dir.path().join("x.sh");
        let config = IntegrityConfig::load(temp_dir.path(), script, lookup(&[])).unwrap();
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(INTEGRITY_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(CONFIG_FILE), "levle: checksum\n").unwrap();

        let script = temp_dir.path().join("x.sh");
        let result = IntegrityConfig::load(temp_dir.path(), script, lookup(&[]));
        assert!(matches!(result, Err(IntegrityError::ConfigParse { .. })));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
