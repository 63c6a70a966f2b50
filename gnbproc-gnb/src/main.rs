//! gnb-proc: runs the UE procedure core against loopback peers
//!
//! # Usage
//!
//! ```bash
//! gnb-proc -c config/gnb-proc.yaml --ues 16
//! ```

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use gnbproc_common::{init_logging, GnbProcConfig, LogLevel};
use gnbproc_gnb::{load_and_validate_gnb_proc_config, LoopbackScenario};

/// gnb-proc - UE procedure orchestration on loopback peers
#[derive(Parser, Debug)]
#[command(name = "gnb-proc")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML). Defaults apply when omitted.
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_file: Option<String>,

    /// Number of UEs to run through the scenario
    #[arg(long = "ues", default_value_t = 4)]
    nof_ues: u16,

    /// Latency of every loopback peer, in milliseconds
    #[arg(long = "latency-ms", default_value_t = 1)]
    latency_ms: u64,
}

fn load_config(args: &Args) -> Result<GnbProcConfig> {
    match &args.config_file {
        Some(path) => load_and_validate_gnb_proc_config(path)
            .with_context(|| format!("Failed to load configuration from {path}")),
        None => Ok(GnbProcConfig::default()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            init_logging(LogLevel::default());
            error!("gnb-proc failed: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(config.log_level());

    match run(config, &args).await {
        Ok(()) => {
            info!("gnb-proc exited successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("gnb-proc failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: GnbProcConfig, args: &Args) -> Result<()> {
    info!(
        "Configuration loaded: name={}, max UEs={}, cells={}, ctrl loop capacity={}",
        config.gnb_name, config.max_nof_ues, config.nof_cells, config.ctrl_loop_capacity
    );
    if args.nof_ues > config.max_nof_ues {
        warn!("Limiting the scenario to {} UEs", config.max_nof_ues);
    }
    let expected = args.nof_ues.min(config.max_nof_ues) as usize;

    let scenario = LoopbackScenario::new(config, Duration::from_millis(args.latency_ms));
    let report = scenario.run(args.nof_ues).await;
    info!(
        "UEs created={} configured={} deleted={}, PDU sessions established={} failed={}",
        report.ues_created,
        report.ues_configured,
        report.ues_deleted,
        report.sessions_established,
        report.sessions_failed
    );

    anyhow::ensure!(
        report.ues_created == expected
            && report.ues_deleted == expected
            && report.sessions_failed == 0,
        "scenario incomplete: {report:?}"
    );
    Ok(())
}
