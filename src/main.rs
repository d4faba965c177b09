//! EBS Snapshot Automation - Main entry point
//!
//! Meant to be run as a cronjob: snapshots every EBS volume attached to an
//! instance carrying the configured tag, then deletes the oldest snapshots per
//! volume beyond the configured count.

use std::process::ExitCode;

use anyhow::Context;
use tracing::{debug, error, info};

use ebs_snapshot_automation::cli::Cli;
use ebs_snapshot_automation::ec2::AwsEc2Client;
use ebs_snapshot_automation::logging;

/// Main application entry point
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Logging comes first so configuration errors below are reported the same
    // way as everything else
    if let Err(e) = logging::init_logging(&cli.log_level) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let (run_config, client_config) = cli.to_configs()?;
    debug!(?run_config, ?client_config, "Configuration parsed");

    let client = AwsEc2Client::connect(&client_config).context("EC2 client setup")?;
    let report = ebs_snapshot_automation::run(&client, &run_config)?;

    info!(
        skipped_operations = report.failure_count(),
        "ebs-snapshot-automation done"
    );
    Ok(())
}
