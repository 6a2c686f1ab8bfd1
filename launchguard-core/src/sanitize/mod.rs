//! Environment sanitization
//!
//! Runs first on every invocation, whatever integrity level is selected, and
//! cannot be turned off. [`sanitize`] is a pure transformation from the
//! inherited environment to a sanitized one plus a report; only
//! [`SanitizedEnvironment::apply_to_process`] touches the real process, and
//! the CLI calls it exactly once at entry.
//!
//! Steps, in order:
//! 1. reset `PATH` to a fixed allow-list (plus package-manager prefixes present on disk)
//! 2. clear linker and interpreter injection variables
//! 3. refuse to run from a world-writable temporary directory
//! 4. refuse a launcher others can modify (warn on a writable parent directory)
//! 5. record the process safety settings: restrictive umask and fail-fast shell options

pub mod env;
pub mod location;

pub use env::Environment;
pub use location::{FileStatus, HostInspector, SystemInspector};

use crate::error::SanitizationError;
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File-creation mask applied to the process
pub const SAFE_UMASK: u32 = 0o077;

/// Knobs for the sanitizer; the defaults are what the launcher runs with
#[derive(Debug, Clone)]
pub struct SanitizerOptions {
    pub temp_roots: Vec<PathBuf>,
    /// Export fail-fast options to child bash processes via `SHELLOPTS`
    pub shell_safety_flags: bool,
    pub umask: u32,
}

impl Default for SanitizerOptions {
    fn default() -> Self {
        Self {
            temp_roots: location::WORLD_WRITABLE_TEMP_ROOTS.iter().map(PathBuf::from).collect(),
            shell_safety_flags: true,
            umask: SAFE_UMASK,
        }
    }
}

/// What sanitization did. Lives for one process and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SanitizationReport {
    pub script_path: PathBuf,
    /// Variables that were present and have been removed, sorted
    pub cleared: Vec<String>,
    /// The search path that replaced the inherited one
    pub path: String,
    /// Package-manager prefixes admitted because they exist on disk
    pub package_prefixes: Vec<String>,
    pub location_ok: bool,
    pub permissions_ok: bool,
    /// False when the platform offers no owner/mode model
    pub permissions_checked: bool,
    pub warnings: Vec<String>,
    pub umask: u32,
    pub shell_options: Option<String>,
}

/// The sanitized environment, ready to be applied or handed to children
#[derive(Debug, Clone)]
pub struct SanitizedEnvironment {
    env: Environment,
    report: SanitizationReport,
}

impl SanitizedEnvironment {
    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn report(&self) -> &SanitizationReport {
        &self.report
    }

    pub fn into_report(self) -> SanitizationReport {
        self.report
    }

    /// Make the process environment match the sanitized one and set the umask.
    ///
    /// Irreversible for the lifetime of the process; every module started
    /// afterwards inherits the result.
    pub fn apply_to_process(&self) {
        let stale: Vec<_> = std::env::vars_os()
            .map(|(name, _)| name)
            .filter(|name| !self.env.contains(name))
            .collect();
        for name in stale {
            std::env::remove_var(&name);
        }
        for (name, value) in self.env.iter() {
            if std::env::var_os(name).as_deref() != Some(value) {
                std::env::set_var(name, value);
            }
        }

        #[cfg(unix)]
        {
            // SAFETY: umask only swaps the process file-creation mask
            unsafe {
                libc::umask(self.report.umask as libc::mode_t);
            }
        }

        debug!("Sanitized environment applied to process");
    }

    /// Shell statements reproducing this sanitization, for `eval` in bash
    pub fn shell_exports(&self) -> String {
        let mut out = String::new();
        for name in &self.report.cleared {
            let function = name.strip_prefix("BASH_FUNC_").and_then(|f| f.strip_suffix("%%"));
            if let Some(function) = function {
                out.push_str(&format!("unset -f {}\n", shell_words::quote(function)));
            } else {
                out.push_str(&format!("unset {}\n", shell_words::quote(name)));
            }
        }
        out.push_str(&format!("export PATH={}\n", shell_words::quote(&self.report.path)));
        if self.report.shell_options.is_some() {
            // SHELLOPTS is read-only inside bash; set the options and export the result
            out.push_str("set -o errexit -o nounset -o pipefail\nexport SHELLOPTS\n");
        }
        out.push_str(&format!("umask {:03o}\n", self.report.umask));
        out
    }
}

/// Sanitize `inherited` for the launcher at `script_path`.
///
/// Location and permission violations are returned as errors and are fatal:
/// the caller must exit.
pub fn sanitize(
    inherited: &Environment,
    script_path: &Path,
    options: &SanitizerOptions,
    inspector: &dyn HostInspector,
) -> Result<SanitizedEnvironment, SanitizationError> {
    let mut env = inherited.clone();

    // 1. search path
    let (path, package_prefixes) = env::build_search_path(|p| inspector.exists(p));
    env.set("PATH", &path);

    // 2. injection variables
    let cleared = env.scrub();
    env.remove("SHELLOPTS");
    if !cleared.is_empty() {
        info!("Cleared {} injection-prone variables: {}", cleared.len(), cleared.join(", "));
    }

    // 3. location
    let resolved = location::resolve_script(script_path, inspector)?;
    location::check_location(&resolved, &options.temp_roots, inspector)?;

    // 4. permissions
    let permissions = location::check_permissions(&resolved, inspector)?;
    for warning in &permissions.warnings {
        warn!("{}", warning);
    }

    // 5. process safety settings
    let shell_options = options.shell_safety_flags.then(|| env::SAFE_SHELLOPTS.to_string());
    if let Some(value) = &shell_options {
        env.set("SHELLOPTS", value);
    }

    let report = SanitizationReport {
        script_path: resolved,
        cleared,
        path,
        package_prefixes,
        location_ok: true,
        permissions_ok: true,
        permissions_checked: permissions.checked,
        warnings: permissions.warnings,
        umask: options.umask,
        shell_options,
    };

    debug!(?report, "Environment sanitized");
    Ok(SanitizedEnvironment { env, report })
}

impl SanitizationReport {
    /// Whether `name` was removed by this run
    pub fn was_cleared(&self, name: impl AsRef<OsStr>) -> bool {
        let name = name.as_ref().to_string_lossy();
        self.cleared.iter().any(|c| *c == name)
    }
}

#[cfg(test)]
mod tests {
    use super::location::fake::FakeInspector;
    use super::*;
    use pretty_assertions::assert_eq;

    const SCRIPT: &str = "/home/ada/yollayah/yollayah.sh";

    fn hostile_env() -> Environment {
        Environment::from_pairs([
            ("PATH", "/tmp/evil:/usr/bin"),
            ("HOME", "/home/ada"),
            ("LD_PRELOAD", "/tmp/evil.so"),
            ("LD_LIBRARY_PATH", "/tmp/lib"),
            ("DYLD_INSERT_LIBRARIES", "/tmp/evil.dylib"),
            ("PYTHONPATH", "/tmp/py"),
            ("BASH_ENV", "/tmp/rc"),
            ("BASH_FUNC_ls%%", "() { /tmp/evil; }"),
            ("SHELLOPTS", "xtrace"),
        ])
    }

    fn sanitize_with_defaults(
        env: &Environment,
        inspector: &FakeInspector,
    ) -> SanitizedEnvironment {
        sanitize(env, Path::new(SCRIPT), &SanitizerOptions::default(), inspector).unwrap()
    }

    #[test]
    fn test_sanitize_resets_path_and_clears_injection_vars() {
        let inspector = FakeInspector::with_script(SCRIPT, 0o755, 1000);
        let sanitized = sanitize_with_defaults(&hostile_env(), &inspector);

        let env = sanitized.env();
        assert_eq!(
            env.get("PATH"),
            Some(OsStr::new("/usr/local/bin:/usr/bin:/bin:/usr/sbin:/sbin"))
        );
        assert_eq!(env.get("HOME"), Some(OsStr::new("/home/ada")));
        assert_eq!(env.get("SHELLOPTS"), Some(OsStr::new("errexit:nounset:pipefail")));
        let injected = [
            "LD_PRELOAD",
            "LD_LIBRARY_PATH",
            "DYLD_INSERT_LIBRARIES",
            "PYTHONPATH",
            "BASH_ENV",
            "BASH_FUNC_ls%%",
        ];
        for name in injected {
            assert!(!env.contains(name), "{name} should be cleared");
            assert!(sanitized.report().was_cleared(name));
        }
        assert_eq!(sanitized.report().umask, 0o077);
        assert!(sanitized.report().location_ok);
        assert!(sanitized.report().permissions_ok);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let inspector = FakeInspector::with_script(SCRIPT, 0o755, 1000);
        let options = SanitizerOptions::default();

        let once = sanitize(&hostile_env(), Path::new(SCRIPT), &options, &inspector).unwrap();
        let twice = sanitize(once.env(), Path::new(SCRIPT), &options, &inspector).unwrap();

        assert_eq!(once.env(), twice.env());
        assert_eq!(once.report().path, twice.report().path);
        assert!(twice.report().cleared.is_empty());
    }

    #[test]
    fn test_absent_variables_are_not_an_error() {
        let inspector = FakeInspector::with_script(SCRIPT, 0o755, 1000);
        let sanitized = sanitize_with_defaults(&Environment::default(), &inspector);
        assert!(sanitized.report().cleared.is_empty());
        assert!(sanitized.env().contains("PATH"));
    }

    #[test]
    fn test_package_manager_prefix_admitted_when_present() {
        let mut inspector = FakeInspector::with_script(SCRIPT, 0o755, 1000);
        inspector.existing_dirs.push(PathBuf::from("/nix/var/nix/profiles/default/bin"));
        let sanitized = sanitize_with_defaults(&hostile_env(), &inspector);
        assert!(sanitized.report().path.ends_with(":/nix/var/nix/profiles/default/bin"));
        assert_eq!(
            sanitized.report().package_prefixes,
            vec!["/nix/var/nix/profiles/default/bin".to_string()]
        );
    }

    #[test]
    fn test_temp_location_fails() {
        let inspector = FakeInspector::with_script("/dev/shm/stage/yollayah.sh", 0o755, 1000);
        let result = sanitize(
            &hostile_env(),
            Path::new("/dev/shm/stage/yollayah.sh"),
            &SanitizerOptions::default(),
            &inspector,
        );
        assert!(matches!(result, Err(SanitizationError::UnsafeLocation { .. })));
    }

    #[test]
    fn test_shell_flags_can_be_left_out() {
        let inspector = FakeInspector::with_script(SCRIPT, 0o755, 1000);
        let options = SanitizerOptions {
            shell_safety_flags: false,
            ..SanitizerOptions::default()
        };
        let sanitized = sanitize(&hostile_env(), Path::new(SCRIPT), &options, &inspector).unwrap();
        assert!(!sanitized.env().contains("SHELLOPTS"));
        assert_eq!(sanitized.report().shell_options, None);
    }

    #[test]
    fn test_shell_exports() {
        let inspector = FakeInspector::with_script(SCRIPT, 0o755, 1000);
        let sanitized = sanitize_with_defaults(&hostile_env(), &inspector);
        let exports = sanitized.shell_exports();

        assert!(exports.contains("unset LD_PRELOAD\n"));
        assert!(exports.contains("unset -f ls\n"));
        assert!(exports.contains("export PATH="));
        assert!(exports.contains("/usr/local/bin:/usr/bin:/bin:/usr/sbin:/sbin"));
        assert!(exports.contains("set -o errexit -o nounset -o pipefail\n"));
        assert!(exports.ends_with("umask 077\n"));
    }
}
