//! Checksum manifest model and its line-oriented text format
//!
//! ```text
//! # launchguard checksum manifest v1
//! # generated: 2026-10-16T09:30:00+00:00
//! 3a7bd3e2360a3d29eea436fcfb7e44c735d117c42d1c1835420b6b9942dd4f1b  lib/ollama.sh
//! 9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08  yollayah.sh
//! ```
//!
//! Entries are sorted by path so regenerated manifests diff cleanly.

use crate::checksum::hasher::is_digest;
use crate::error::IntegrityError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Component, Path};
use tracing::debug;

const HEADER_PREFIX: &str = "# launchguard checksum manifest v";
const GENERATED_PREFIX: &str = "# generated: ";

/// Authoritative record of the tracked file set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub version: u32,
    pub generated_at: Option<DateTime<Utc>>,
    /// Normalized relative path -> hex SHA-256 digest
    pub entries: BTreeMap<String, String>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    /// Create an empty manifest stamped with the current time
    pub fn new() -> Self {
        Manifest {
            version: crate::MANIFEST_VERSION,
            generated_at: Some(Utc::now()),
            entries: BTreeMap::new(),
        }
    }

    /// Add or replace an entry
    pub fn insert(&mut self, path: impl Into<String>, digest: impl Into<String>) {
        self.entries.insert(path.into(), digest.into());
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the manifest text
    pub fn render(&self) -> String {
        let mut out = format!("{HEADER_PREFIX}{}\n", self.version);
        if let Some(generated_at) = self.generated_at {
            out.push_str(GENERATED_PREFIX);
            out.push_str(&generated_at.to_rfc3339());
            out.push('\n');
        }
        for (path, digest) in &self.entries {
            out.push_str(digest);
            out.push_str("  ");
            out.push_str(path);
            out.push('\n');
        }
        out
    }

    /// Parse manifest text; `source` only labels errors
    pub fn parse(content: &str, source: &Path) -> Result<Self, IntegrityError> {
        let parse_error = |line: usize, reason: String| IntegrityError::ManifestParse {
            path: source.to_path_buf(),
            line,
            reason,
        };

        let mut manifest = Manifest {
            version: crate::MANIFEST_VERSION,
            generated_at: None,
            entries: BTreeMap::new(),
        };

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim_end_matches('\r');

            if line.trim().is_empty() {
                continue;
            }

            if let Some(comment) = line.strip_prefix('#') {
                if let Some(version) = line.strip_prefix(HEADER_PREFIX) {
                    let version = version.trim();
                    manifest.version = version.parse().map_err(|_| {
                        parse_error(line_no, format!("invalid version '{version}'"))
                    })?;
                } else if let Some(stamp) = line.strip_prefix(GENERATED_PREFIX) {
                    let parsed = DateTime::parse_from_rfc3339(stamp.trim())
                        .map_err(|e| parse_error(line_no, format!("invalid timestamp: {e}")))?;
                    manifest.generated_at = Some(parsed.with_timezone(&Utc));
                } else {
                    debug!("Ignoring manifest comment: {}", comment.trim());
                }
                continue;
            }

            // sha256sum separates with two spaces, or space-asterisk in binary mode
            let (digest, path) = line
                .split_once("  ")
                .or_else(|| line.split_once(" *"))
                .ok_or_else(|| parse_error(line_no, "expected '<digest>  <path>'".to_string()))?;

            let digest = digest.to_ascii_lowercase();
            if !is_digest(&digest) {
                return Err(parse_error(line_no, format!("'{digest}' is not a SHA-256 hex digest")));
            }

            let path = normalize_relative(path).map_err(|reason| parse_error(line_no, reason))?;

            if manifest.entries.insert(path.clone(), digest).is_some() {
                return Err(parse_error(line_no, format!("duplicate entry for '{path}'")));
            }
        }

        Ok(manifest)
    }

    /// Load a manifest from disk
    pub fn load(manifest_path: &Path) -> Result<Self, IntegrityError> {
        if !manifest_path.exists() {
            return Err(IntegrityError::ManifestNotFound {
                path: manifest_path.to_path_buf(),
            });
        }

        let content =
            std::fs::read_to_string(manifest_path).map_err(|e| IntegrityError::ManifestRead {
                path: manifest_path.to_path_buf(),
                source: e,
            })?;

        Self::parse(&content, manifest_path)
    }

    /// Write the manifest atomically, creating the parent directory if needed.
    ///
    /// The new content is written and synced to a temporary file beside the
    /// target, then renamed over it; an interrupted save leaves the previous
    /// manifest intact.
    pub fn save(&self, manifest_path: &Path) -> Result<(), IntegrityError> {
        let write_error = |e| IntegrityError::ManifestWrite {
            path: manifest_path.to_path_buf(),
            source: e,
        };

        let parent = match manifest_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(write_error)?;

        let mut temp = tempfile::Builder::new()
            .prefix(".checksums-")
            .tempfile_in(parent)
            .map_err(write_error)?;
        temp.write_all(self.render().as_bytes()).map_err(write_error)?;
        temp.as_file().sync_all().map_err(write_error)?;
        temp.persist(manifest_path).map_err(|e| write_error(e.error))?;
        Ok(())
    }
}

/// Normalize a manifest path: forward slashes, relative, no `.`/`..` or empty parts.
///
/// Backslashes are separators only on Windows; elsewhere they are ordinary
/// file name characters and are kept.
pub fn normalize_relative(raw: &str) -> Result<String, String> {
    #[cfg(windows)]
    let unified = raw.replace('\\', "/");
    #[cfg(not(windows))]
    let unified = raw.to_string();
    let trimmed = unified.strip_prefix("./").unwrap_or(&unified);
    if trimmed.is_empty() {
        return Err("empty path".to_string());
    }

    let path = Path::new(trimmed);
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => return Err(format!("'{raw}' escapes the project root")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(format!("'{raw}' must be relative to the project root"))
            }
        }
    }

    if parts.is_empty() {
        return Err(format!("'{raw}' does not name a file"));
    }

    Ok(parts.join("/"))
}
