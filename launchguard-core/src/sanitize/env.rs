//! Environment model and the variable scrubbing rules

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::Path;

/// System directories that make up the reset search path, in order
pub const SYSTEM_PATH: &[&str] = &["/usr/local/bin", "/usr/bin", "/bin", "/usr/sbin", "/sbin"];

/// Package-manager prefixes appended to the search path when present on disk
pub const PACKAGE_MANAGER_PREFIXES: &[&str] = &[
    "/opt/homebrew/bin",
    "/opt/local/bin",
    "/home/linuxbrew/.linuxbrew/bin",
    "/nix/var/nix/profiles/default/bin",
    "/snap/bin",
];

/// Variables that steer the dynamic linker or an interpreter
pub const CLEARED_VARS: &[&str] = &[
    // bash
    "BASH_ENV",
    "ENV",
    "BASHOPTS",
    "CDPATH",
    "GLOBIGNORE",
    "PS4",
    // python
    "PYTHONPATH",
    "PYTHONHOME",
    "PYTHONSTARTUP",
    "PYTHONUSERBASE",
    "PYTHONINSPECT",
    // perl
    "PERL5LIB",
    "PERLLIB",
    "PERL5OPT",
    "PERL5DB",
    // ruby
    "RUBYLIB",
    "RUBYOPT",
    // node
    "NODE_OPTIONS",
    "NODE_PATH",
];

/// Prefixes cleared wholesale: linker hooks and exported bash functions
pub const CLEARED_PREFIXES: &[&str] = &["LD_", "DYLD_", "BASH_FUNC_"];

/// Shell options every child bash inherits through `SHELLOPTS`
pub const SAFE_SHELLOPTS: &str = "errexit:nounset:pipefail";

/// Whether a variable name must not survive sanitization
pub fn is_cleared(name: &str) -> bool {
    CLEARED_VARS.contains(&name) || CLEARED_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// A snapshot of process environment variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<OsString, OsString>,
}

impl Environment {
    /// Snapshot the current process environment
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars_os().collect(),
        }
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        Self {
            vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn get(&self, name: impl AsRef<OsStr>) -> Option<&OsStr> {
        self.vars.get(name.as_ref()).map(OsString::as_os_str)
    }

    pub fn contains(&self, name: impl AsRef<OsStr>) -> bool {
        self.vars.contains_key(name.as_ref())
    }

    pub fn set(&mut self, name: impl Into<OsString>, value: impl Into<OsString>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: impl AsRef<OsStr>) -> Option<OsString> {
        self.vars.remove(name.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Remove every linker/interpreter variable; returns the names removed, sorted
    pub(crate) fn scrub(&mut self) -> Vec<String> {
        let doomed: Vec<OsString> = self
            .vars
            .keys()
            .filter(|name| is_cleared(&name.to_string_lossy()))
            .cloned()
            .collect();

        doomed
            .into_iter()
            .map(|name| {
                self.vars.remove(&name);
                name.to_string_lossy().into_owned()
            })
            .collect()
    }
}

/// Build the reset search path from the allow-list and the prefixes present
pub(crate) fn build_search_path<F>(exists: F) -> (String, Vec<String>)
where
    F: Fn(&Path) -> bool,
{
    let admitted: Vec<String> = PACKAGE_MANAGER_PREFIXES
        .iter()
        .filter(|prefix| exists(Path::new(prefix)))
        .map(|prefix| prefix.to_string())
        .collect();

    let path = SYSTEM_PATH
        .iter()
        .map(|dir| dir.to_string())
        .chain(admitted.iter().cloned())
        .collect::<Vec<_>>()
        .join(":");

    (path, admitted)
}
