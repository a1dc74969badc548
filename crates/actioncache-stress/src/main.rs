//! Stress tests the action cache with simulated actions.
//!
//! Each workload dispatches one action with a given concurrency for the whole duration of the
//! test, cycling through a fixed number of distinct payloads. The report compares the number of
//! dispatches with the number of actual executions.

use std::path::PathBuf;
use std::time::Duration;

use actioncache::config::Config;
use actioncache::{logging, metrics};
use anyhow::{Context, Result};
use clap::Parser;
use humantime::parse_duration;

use crate::workloads::WorkloadsConfig;

mod stresstest;
mod workloads;

/// Command line interface parser.
#[derive(Parser)]
struct Cli {
    /// Path to your configuration file.
    #[arg(long, short, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Path to the workload definition file.
    #[arg(long, short, value_name = "FILE")]
    workloads: PathBuf,

    /// Duration of the stresstest.
    #[arg(long, short, value_parser = parse_duration)]
    duration: Duration,
}

fn main() {
    match execute() {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            logging::ensure_log_error(&error);
            std::process::exit(1);
        }
    }
}

fn execute() -> Result<()> {
    let cli = Cli::parse();

    // parse configs
    let workloads_file =
        std::fs::File::open(&cli.workloads).context("failed to open workloads file")?;
    let workloads: WorkloadsConfig =
        serde_yaml::from_reader(workloads_file).context("failed to parse workloads YAML")?;
    let config = Config::get(cli.config.as_deref()).context("failed loading config")?;

    // SAFETY: The runtime is started below, so there are no other threads yet.
    unsafe { logging::init_logging(&config) };
    metrics::configure(&config.metrics).context("failed to configure metrics")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the runtime")?;
    runtime.block_on(stresstest::perform_stresstest(
        config,
        workloads,
        cli.duration,
    ))
}
