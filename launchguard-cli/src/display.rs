//! Human and JSON rendering of run results
//!
//! Verification output goes to stderr so the next launcher stage owns stdout;
//! `status` and `generate` print to stdout.

use anyhow::Result;
use launchguard_core::orchestrator::{GenerateSummary, StatusSummary};
use launchguard_core::outcome::Finding;
use launchguard_core::{
    SanitizationReport, Verdict, VerificationFinding, VerificationOutcome, VerificationRun,
};
use serde::Serialize;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

// Table row structure for findings
#[derive(Tabled)]
struct FindingRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl From<&VerificationFinding> for FindingRow {
    fn from(finding: &VerificationFinding) -> Self {
        let (status, detail) = match &finding.finding {
            Finding::Matched => ("ok", String::new()),
            Finding::Mismatched { expected, actual } => (
                "MODIFIED",
                format!("expected {}…  found {}…", short(expected), short(actual)),
            ),
            Finding::Missing => ("MISSING", "tracked file is gone".to_string()),
            Finding::Unreadable { reason } => ("UNREADABLE", reason.clone()),
        };
        FindingRow {
            path: finding.path.clone(),
            status: status.to_string(),
            detail,
        }
    }
}

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "Setting")]
    key: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Serialize)]
struct CheckOutput<'a> {
    level: String,
    outcome: &'a VerificationOutcome,
    verdict: Verdict,
    exit_code: i32,
    sanitization: &'a SanitizationReport,
    config_warnings: &'a [String],
}

fn short(digest: &str) -> &str {
    digest.get(..16).unwrap_or(digest)
}

fn table<T: Tabled>(rows: &[T]) -> String {
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string()
}

pub fn print_verification(run: &VerificationRun, json: bool) -> Result<()> {
    if json {
        let output = CheckOutput {
            level: run.level.to_string(),
            outcome: &run.outcome,
            verdict: run.verdict,
            exit_code: run.exit_code(),
            sanitization: run.sanitized.report(),
            config_warnings: &run.config_warnings,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let report = run.sanitized.report();
    for warning in run.config_warnings.iter().chain(&report.warnings) {
        eprintln!("⚠️  {warning}");
    }

    match &run.outcome {
        VerificationOutcome::Verified { checked } => {
            eprintln!("✅ Integrity verified ({} level, {} files)", run.level, checked);
        }
        VerificationOutcome::Skipped { reason } => {
            eprintln!("⚠️  Integrity checks skipped: {reason}");
        }
        VerificationOutcome::Inconclusive { reason } => {
            eprintln!("❓ Integrity could not be determined ({} level)", run.level);
            eprintln!("   {}", reason.replace('\n', "\n   "));
        }
        VerificationOutcome::Tampered { findings } => {
            eprintln!("❌ Integrity check FAILED: {} tracked files differ", findings.len());
            let rows: Vec<FindingRow> = findings.iter().map(FindingRow::from).collect();
            eprintln!("{}", table(&rows));
        }
    }

    match run.verdict {
        Verdict::Proceed => {}
        Verdict::Warn => eprintln!("   Continuing anyway."),
        Verdict::Abort => {
            eprintln!("   Refusing to continue.");
            if matches!(run.outcome, VerificationOutcome::Tampered { .. }) {
                eprintln!(
                    "   If these changes are intentional, \
                     run 'launchguard generate' to record them."
                );
            }
        }
    }

    Ok(())
}

pub fn print_generate(summary: &GenerateSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!(
        "✅ Wrote {} entries to {}",
        summary.files,
        summary.manifest_path.display()
    );
    println!("\nNote: {}", summary.known_limitation);
    Ok(())
}

pub fn print_status(summary: &StatusSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    let manifest = match (&summary.tracked_files, &summary.manifest_error) {
        (Some(count), _) => format!("{} ({} files)", summary.manifest_path.display(), count),
        (None, Some(error)) => format!(
            "{} (unusable: {})",
            summary.manifest_path.display(),
            error.lines().next().unwrap_or("")
        ),
        (None, None) => format!("{} (not generated)", summary.manifest_path.display()),
    };

    let rows = vec![
        SettingRow {
            key: "Level",
            value: summary.level.to_string(),
        },
        SettingRow {
            key: "Root",
            value: summary.root.display().to_string(),
        },
        SettingRow {
            key: "Launcher",
            value: summary.script_path.display().to_string(),
        },
        SettingRow { key: "Manifest", value: manifest },
        SettingRow {
            key: "Generated",
            value: summary
                .generated_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string()),
        },
        SettingRow {
            key: "Trust anchor",
            value: summary.trust_anchor.clone().unwrap_or_else(|| "-".to_string()),
        },
        SettingRow {
            key: "Reconcile",
            value: if summary.reconcile { "allowed" } else { "report only" }.to_string(),
        },
        SettingRow {
            key: "On tampered",
            value: format!("{:?}", summary.on_tampered).to_lowercase(),
        },
        SettingRow {
            key: "On inconclusive",
            value: format!("{:?}", summary.on_inconclusive).to_lowercase(),
        },
        SettingRow {
            key: "PATH",
            value: summary.sanitization.path.clone(),
        },
        SettingRow {
            key: "Cleared",
            value: if summary.sanitization.cleared.is_empty() {
                "-".to_string()
            } else {
                summary.sanitization.cleared.join(", ")
            },
        },
    ];

    println!("{}", table(&rows));

    for warning in summary.config_warnings.iter().chain(&summary.sanitization.warnings) {
        println!("⚠️  {warning}");
    }
    println!("\nNote: {}", summary.known_limitation);
    Ok(())
}
