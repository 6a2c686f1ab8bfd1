//! Selection of the tracked file set under a project root

use crate::checksum::manifest::normalize_relative;
use crate::error::IntegrityError;
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Tracked by default: every shell script in the tree, plus the integrity
/// configuration that decides how strictly they are checked
pub const DEFAULT_INCLUDES: &[&str] = &["**/*.sh", ".yollayah/integrity.yml"];

/// Never tracked by default
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".git/**",
    "target/**",
    "node_modules/**",
    ".yollayah/checksums.sha256",
    ".yollayah/backups/**",
];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Include/exclude glob patterns matched against normalized relative paths
#[derive(Debug, Clone)]
pub struct FileSelector {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl Default for FileSelector {
    fn default() -> Self {
        // The defaults are literals known to compile
        Self::new(DEFAULT_INCLUDES, DEFAULT_EXCLUDES).unwrap_or(FileSelector {
            include: Vec::new(),
            exclude: Vec::new(),
        })
    }
}

impl FileSelector {
    /// Compile include and exclude patterns
    pub fn new<I, E>(include: I, exclude: E) -> Result<Self, IntegrityError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Ok(FileSelector {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// Whether a normalized relative path belongs to the tracked set
    pub fn matches(&self, relative: &str) -> bool {
        let included = self.include.iter().any(|p| p.matches_with(relative, MATCH_OPTIONS));
        let excluded = self.exclude.iter().any(|p| p.matches_with(relative, MATCH_OPTIONS));
        included && !excluded
    }

    /// Walk `root` and return the selected files as sorted relative paths.
    ///
    /// Symlinks are neither followed nor selected: a link could point the
    /// manifest at content outside the project.
    pub fn select(&self, root: &Path) -> Result<Vec<(String, PathBuf)>, IntegrityError> {
        let mut selected = Vec::new();

        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| IntegrityError::Walk {
                root: root.to_path_buf(),
                source: e,
            })?;

            let file_type = entry.file_type();
            if file_type.is_symlink() {
                debug!("Skipping symlink: {}", entry.path().display());
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let lossy = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if self.matches(&lossy) {
                let relative = manifest_name(relative, &lossy).map_err(|reason| {
                    IntegrityError::UntrackablePath {
                        path: entry.path().to_path_buf(),
                        reason,
                    }
                })?;
                trace!("Selected {}", relative);
                selected.push((relative, entry.path().to_path_buf()));
            }
        }

        selected.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(selected)
    }
}

/// The manifest form of a selected path, if it survives a write and re-read unchanged
fn manifest_name(relative: &Path, lossy: &str) -> Result<String, &'static str> {
    if relative.to_str().is_none() {
        return Err("the file name is not valid UTF-8");
    }
    if lossy.contains(['\n', '\r']) {
        return Err("the file name contains a line break");
    }
    match normalize_relative(lossy) {
        Ok(normalized) if normalized == lossy => Ok(normalized),
        _ => Err("the file name does not survive manifest normalization"),
    }
}

fn compile<P>(patterns: P) -> Result<Vec<Pattern>, IntegrityError>
where
    P: IntoIterator,
    P::Item: AsRef<str>,
{
    patterns
        .into_iter()
        .map(|p| {
            let p = p.as_ref();
            Pattern::new(p).map_err(|e| IntegrityError::Selector {
                pattern: p.to_string(),
                source: e,
            })
        })
        .collect()
}
