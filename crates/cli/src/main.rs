// uocc-skid - UOCC survey sync job
//
// Run once per schedule tick. No subcommands: every run does the whole job.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use uocc_cli::exit_codes::{EXIT_ERROR, EXIT_SUCCESS};
use uocc_cli::{cleanup, logging, run, RunLog, SkidError};
use uocc_config::{Secrets, SecretsLocation, Settings};

#[derive(Parser)]
#[command(name = "uocc-skid")]
#[command(about = "Distribute UOCC survey responses to district ledgers, reconcile contacts, reload facility layers")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Settings file (TOML); built-in defaults apply when omitted
    #[arg(long, env = "UOCC_SETTINGS")]
    settings: Option<PathBuf>,

    /// Local secrets directory, used when the secrets mount is absent
    #[arg(long, env = "UOCC_SECRETS_DIR", default_value = "secrets")]
    secrets_dir: PathBuf,

    /// Secrets mount point
    #[arg(long, env = "UOCC_SECRETS_MOUNT", default_value = "/secrets", hide = true)]
    secrets_mount: PathBuf,
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("UOCC_COMMIT"), ")",
            "\nbuild:   debug",
            "\ntarget:  ", env!("UOCC_TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("UOCC_COMMIT"), ")",
            "\nbuild:   release",
            "\ntarget:  ", env!("UOCC_TARGET"),
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_job(cli) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn run_job(cli: Cli) -> Result<(), CliError> {
    let settings = Settings::load(cli.settings.as_deref()).map_err(SkidError::from)?;
    let level = settings.level_filter().map_err(SkidError::from)?;
    let location = SecretsLocation {
        mount_root: cli.secrets_mount,
        local_dir: cli.secrets_dir,
    };
    let secrets = Secrets::load(&location).map_err(SkidError::from)?;

    let workspace = tempfile::Builder::new()
        .prefix("uocc-skid-")
        .tempdir()
        .map_err(|e| CliError::io(format!("creating temp dir: {e}")))?;
    let started = chrono::Local::now().naive_local();
    let run_log = RunLog::create(workspace.path(), &settings.log_file_name, started)
        .map_err(|e| CliError::io(format!("creating log file: {e}")))?;
    if let Err(e) = logging::init(level, &run_log) {
        eprintln!("warning: logging not configured: {e}");
    }
    log::info!("Starting {} {}", settings.skid_name, env!("CARGO_PKG_VERSION"));

    let result = run(&settings, &secrets, &run_log);
    if let Err(e) = &result {
        log::error!("{} failed: {e}", settings.skid_name);
    }
    cleanup(&run_log, workspace);

    let summary = result?;
    let failed = summary.failed_districts();
    if !failed.is_empty() {
        return Err(SkidError::DistributionIncomplete(failed).into());
    }
    Ok(())
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<SkidError> for CliError {
    fn from(err: SkidError) -> Self {
        let error = Self { code: err.exit_code(), message: err.to_string(), hint: None };
        match err.hint() {
            Some(hint) => error.with_hint(hint),
            None => error,
        }
    }
}
