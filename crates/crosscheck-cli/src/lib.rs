//! crosscheck - dual-endpoint conformance harness
//!
//! Runs the conformance suite (both test families in both directions, then
//! the scripted timing replay) against the simulated bench and reports the
//! outcome through the process exit status:
//! - 0 when every test and timing step passed
//! - 1 when any of them failed
//! - 2 when the run could not complete

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use crosscheck_core::{sim_suite, HarnessConfig, SuiteReport};
use crosscheck_sim::SimFaults;
use crosscheck_timing::TimingScript;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "crosscheck")]
#[command(about = "Cross-check a wire-protocol peer against direct hardware lines", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Harness configuration file (JSON)
    #[arg(short, long, env = "CROSSCHECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Timing script (JSON); the reference script when omitted
    #[arg(short, long)]
    pub script: Option<PathBuf>,

    /// Compiled timing program to upload to the peer
    #[arg(short, long)]
    pub program: Option<PathBuf>,

    /// Write the suite report as JSON to this file
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Run the conformance families only
    #[arg(long)]
    pub skip_timing: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Simulated peer never sends input notifications
    #[arg(long)]
    pub mute_notifications: bool,

    /// Simulated peer output channel stuck Low
    #[arg(long, value_name = "CHANNEL")]
    pub stuck_channel: Option<usize>,

    /// Simulated peer refuses connections
    #[arg(long)]
    pub refuse_connection: bool,
}

impl Cli {
    pub fn faults(&self) -> SimFaults {
        SimFaults {
            refuse_connection: self.refuse_connection,
            mute_notifications: self.mute_notifications,
            stuck_output: self.stuck_channel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Passed,
    Failed,
    Aborted,
}

impl RunStatus {
    pub fn code(self) -> u8 {
        match self {
            RunStatus::Passed => 0,
            RunStatus::Failed => 1,
            RunStatus::Aborted => 2,
        }
    }
}

impl From<RunStatus> for ExitCode {
    fn from(status: RunStatus) -> Self {
        ExitCode::from(status.code())
    }
}

pub fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();
}

/// Parse `args`, install logging and run.
pub async fn run_with_args<I, T>(args: I) -> RunStatus
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_tracing(cli.verbose);
    run(&cli).await
}

pub async fn run(cli: &Cli) -> RunStatus {
    match execute(cli).await {
        Ok(report) if report.passed() => {
            info!("all tests passed");
            RunStatus::Passed
        }
        Ok(report) => {
            warn!(failed = report.failed(), "tests failed");
            RunStatus::Failed
        }
        Err(err) => {
            error!(error = %format!("{err:#}"), "run aborted");
            RunStatus::Aborted
        }
    }
}

/// Load inputs, run the suite on the simulated bench, write the report.
pub async fn execute(cli: &Cli) -> anyhow::Result<SuiteReport> {
    let config = match &cli.config {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => HarnessConfig::default(),
    };
    let script = match &cli.script {
        Some(path) => TimingScript::load(path)
            .with_context(|| format!("loading timing script {}", path.display()))?,
        None => TimingScript::reference(),
    };
    let payload = match &cli.program {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("reading timing program {}", path.display()))?,
        None => Vec::new(),
    };
    if !cli.skip_timing {
        config.check_script(&script)?;
    }

    let (suite, _bench) = sim_suite(config, &script, cli.faults());
    let report = if cli.skip_timing {
        suite.run_conformance().await?
    } else {
        suite.run(&script, &payload).await?
    };

    info!(
        succeeded = report.run.succeeded,
        failed = report.run.failed,
        "conformance summary"
    );
    if let Some(timing) = &report.timing {
        info!(
            succeeded = timing.succeeded,
            failed = timing.failed,
            "timing summary"
        );
    }

    if let Some(path) = &cli.report {
        let json = report.to_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("writing report {}", path.display()))?;
    }
    Ok(report)
}
