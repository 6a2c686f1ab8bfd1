//! launchguard - sanitize the environment and verify the Yollayah launcher
//! before any of its modules are sourced.
//!
//! Exit codes: 0 proceed, 1 error, 2 usage, 3 sanitization failure,
//! 4 tampered, 5 inconclusive.

use clap::{Args, Parser, ValueEnum};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

use launchguard_core::outcome::exit_code;

mod commands;
mod display;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "launchguard",
    about = "Environment hardening and script integrity verification for the Yollayah launcher",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON (always on stderr)
    #[clap(long, global = true)]
    log_json: bool,

    #[clap(flatten)]
    overrides: ConfigArgs,
}

/// Flags that override the file and environment configuration
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Project root the manifest paths are relative to (default: current directory)
    #[clap(long, env = "YOLLAYAH_ROOT", global = true)]
    pub root: Option<PathBuf>,

    /// Launcher script whose location and permissions are checked
    #[clap(long, env = "YOLLAYAH_SCRIPT_PATH", global = true)]
    pub script: Option<PathBuf>,

    /// Checksum manifest path (relative paths resolve against the root)
    #[clap(long, global = true)]
    pub manifest: Option<PathBuf>,

    /// Integrity level: remote, checksum, signature or disabled
    #[clap(long, global = true)]
    pub level: Option<String>,

    /// Skip all integrity checks (sanitization still runs)
    #[clap(long, global = true)]
    pub skip: bool,

    /// Trust anchor repository URL for the remote level
    #[clap(long, global = true)]
    pub remote_url: Option<String>,

    /// Trust anchor branch or tag
    #[clap(long, global = true)]
    pub remote_branch: Option<String>,

    /// Allow the remote level to overwrite diverging local files
    #[clap(long, global = true)]
    pub reconcile: bool,

    /// Print machine-readable JSON on stdout
    #[clap(long, global = true)]
    pub json: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Sanitize and verify, then exit or exec the given command
    Check {
        /// Command to exec with the sanitized environment when verification allows it
        #[clap(last = true)]
        exec: Vec<OsString>,
    },

    /// Regenerate the checksum manifest from the current scripts
    Generate,

    /// Show configuration and manifest summary
    Status,

    /// Print shell statements reproducing the sanitization, for `eval`
    Env,
}

fn initialize_tracing(log_level: &LogLevel, json: bool) {
    let filter = EnvFilter::new(log_level.to_filter_directive());

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr) // stdout is reserved for command output
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, cli.log_json);

    let code = match commands::run(cli.command, &cli.overrides) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {e:#}");
            exit_code::ERROR
        }
    };

    std::process::exit(code);
}
