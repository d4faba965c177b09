//! One full run: create snapshots, then rotate them.
//!
//! # Sequencing
//!
//! 1. `SnapshotCreator` runs first. A failed instance listing aborts the run.
//!    Finding no instances ends the run cleanly and the pruner is not started.
//! 2. `SnapshotPruner` runs second. A failed snapshot listing aborts the run.
//!    In a dry run it is told which volumes would have been snapshotted, so
//!    its preview counts the snapshot that was not taken.
//!
//! Per-resource failures in either phase are logged, counted and otherwise
//! do not change the outcome.

use tracing::{info, warn};

use crate::config::RunConfig;
use crate::creator::{Clock, LocalClock, SnapshotCreator};
use crate::ec2::Ec2Api;
use crate::error::Result;
use crate::pruner::SnapshotPruner;
use crate::report::{CreateOutcome, RunReport};

/// Run both phases against `api` with the machine's local clock.
pub fn run<A: Ec2Api + ?Sized>(api: &A, config: &RunConfig) -> Result<RunReport> {
    run_with_clock(api, config, &LocalClock)
}

/// Run both phases, naming snapshots with timestamps from `clock`.
pub fn run_with_clock<A: Ec2Api + ?Sized>(
    api: &A,
    config: &RunConfig,
    clock: &dyn Clock,
) -> Result<RunReport> {
    info!(
        selector = %config.selector,
        num_backups = config.num_backups,
        dry_run = config.dry_run,
        "Starting snapshot run"
    );

    let create = SnapshotCreator::new(api, config).with_clock(clock).run()?;
    if create == CreateOutcome::NoInstances {
        info!("Nothing to snapshot, skipping rotation");
        return Ok(RunReport { create, prune: None });
    }

    let pending: &[String] = match &create {
        CreateOutcome::Completed(report) => report.would_snapshot.as_slice(),
        CreateOutcome::NoInstances => &[],
    };
    let prune = SnapshotPruner::new(api, config).with_pending(pending).run()?;
    let report = RunReport {
        create,
        prune: Some(prune),
    };

    let failures = report.failure_count();
    if failures > 0 {
        warn!(failures, "Snapshot run finished with skipped operations");
    } else {
        info!("Snapshot run finished");
    }
    Ok(report)
}
