//! Command implementations: resolve configuration, run the orchestrator,
//! report, and map the result to an exit code.

use anyhow::{Context, Result};
use launchguard_core::config::{
    env_vars, parse_bool, IntegrityConfig, IntegrityLevel, OperatingMode,
};
use launchguard_core::outcome::exit_code;
use launchguard_core::sanitize::{Environment, SanitizedEnvironment};
use launchguard_core::{IntegrityError, Orchestrator, RunReport, Verdict, VerificationRun};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::display;
use crate::{Command, ConfigArgs};

/// Launcher file looked for under the root when no script is given
const DEFAULT_LAUNCHER: &str = "yollayah.sh";

/// Resolve, sanitize and apply the environment, then dispatch `command`.
///
/// The sanitized environment and umask are applied to this process before
/// the async runtime starts, so no worker thread exists while variables
/// change and every file written afterwards gets the restrictive mask.
pub fn run(command: Command, args: &ConfigArgs) -> Result<i32> {
    let mut config = resolve_config(args)?;
    match &command {
        Command::Generate => config.mode = OperatingMode::Generate,
        Command::Status => config.mode = OperatingMode::Status,
        Command::Check { .. } | Command::Env => {}
    }
    debug!(?config, "Resolved integrity configuration");

    let orchestrator = Orchestrator::new(config);
    let inherited = Environment::capture();

    let sanitized = match orchestrator.sanitize(&inherited) {
        Ok(sanitized) => sanitized,
        Err(e) => {
            eprintln!("{e}");
            return Ok(exit_code::SANITIZATION_FAILED);
        }
    };
    sanitized.apply_to_process();

    if let Command::Env = command {
        return env_command(&sanitized, args.json);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    runtime.block_on(dispatch(&orchestrator, &inherited, command, args))
}

async fn dispatch(
    orchestrator: &Orchestrator,
    inherited: &Environment,
    command: Command,
    args: &ConfigArgs,
) -> Result<i32> {
    let result = tokio::select! {
        result = orchestrator.run(inherited) => result,
        _ = shutdown_signal() => {
            warn!("Interrupted before verification finished; integrity is undetermined");
            return Ok(exit_code::INCONCLUSIVE);
        }
    };

    let report = match result {
        Ok(report) => report,
        Err(IntegrityError::Sanitization(e)) => {
            eprintln!("{e}");
            return Ok(exit_code::SANITIZATION_FAILED);
        }
        Err(e) => return Err(e.into()),
    };

    let code = report.exit_code();
    match report {
        RunReport::Verification(run) => {
            display::print_verification(&run, args.json)?;
            if let Command::Check { exec } = command {
                if !exec.is_empty() {
                    return exec_next_stage(&run, exec);
                }
            }
        }
        RunReport::Generated(summary) => display::print_generate(&summary, args.json)?,
        RunReport::Status(summary) => display::print_status(&summary, args.json)?,
    }

    Ok(code)
}

/// Layer CLI flags over the file and environment configuration
pub fn resolve_config(args: &ConfigArgs) -> Result<IntegrityConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let root = match &args.root {
        Some(root) => cwd.join(root),
        None => cwd,
    };
    let script = match &args.script {
        Some(script) => root.join(script),
        None => default_script(&root)?,
    };

    let mut config = IntegrityConfig::load(&root, &script, |name| std::env::var(name).ok())
        .with_context(|| format!("Failed to load integrity configuration for {}", root.display()))?;

    if let Some(level) = &args.level {
        config.set_level_str(level, "--level");
    }
    if let Some(manifest) = &args.manifest {
        config.manifest_path = root.join(manifest);
    }
    match (&args.remote_url, &args.remote_branch) {
        (Some(url), branch) => config.set_anchor(url.clone(), branch.clone()),
        (None, Some(branch)) => match config.remote.anchor.as_mut() {
            Some(anchor) => anchor.branch = branch.clone(),
            None => warn!("--remote-branch has no effect without a trust anchor URL"),
        },
        (None, None) => {}
    }
    if args.reconcile {
        config.remote.reconcile = true;
    }

    // The skip switch wins over any level, including one given with --level
    let env_skip = std::env::var(env_vars::SKIP).ok().and_then(|v| parse_bool(&v)) == Some(true);
    if args.skip || env_skip {
        config.level = IntegrityLevel::Disabled;
    }

    Ok(config)
}

fn default_script(root: &Path) -> Result<PathBuf> {
    let launcher = root.join(DEFAULT_LAUNCHER);
    if launcher.exists() {
        return Ok(launcher);
    }
    let exe = std::env::current_exe()
        .context("Failed to determine the launcher script; pass --script")?;
    warn!(
        "No {} under {}; checking location and permissions of {} instead (pass --script to choose)",
        DEFAULT_LAUNCHER,
        root.display(),
        exe.display()
    );
    Ok(exe)
}

fn env_command(sanitized: &SanitizedEnvironment, json: bool) -> Result<i32> {
    if json {
        println!("{}", serde_json::to_string_pretty(sanitized.report())?);
    } else {
        print!("{}", sanitized.shell_exports());
    }
    Ok(exit_code::OK)
}

/// Replace this process with the next launcher stage, unless the verdict aborts
fn exec_next_stage(run: &VerificationRun, exec: Vec<OsString>) -> Result<i32> {
    if run.verdict == Verdict::Abort {
        return Ok(run.exit_code());
    }

    let mut argv = exec.into_iter();
    let Some(program) = argv.next() else {
        return Ok(run.exit_code());
    };

    // the process environment was already sanitized at startup
    info!("Handing over to {}", Path::new(&program).display());

    let mut command = std::process::Command::new(&program);
    command.args(argv);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // exec only returns on failure
        let err = command.exec();
        return Err(err)
            .with_context(|| format!("Failed to exec {}", Path::new(&program).display()));
    }

    #[cfg(not(unix))]
    {
        let status = command
            .status()
            .with_context(|| format!("Failed to run {}", Path::new(&program).display()))?;
        return Ok(status.code().unwrap_or(exit_code::ERROR));
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                debug!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
