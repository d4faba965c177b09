//! Retention pruning of tool-created snapshots.
//!
//! Split in two like the rest of the crate's planning code:
//!
//! - `plan_retention` is pure: snapshots in, ordered deletions out.
//! - `SnapshotPruner` lists snapshots, plans, and executes the plan.
//!
//! # Ordering
//!
//! Within a volume, snapshots are ordered by `(start_time, snapshot_id)`. The
//! id tie-break keeps the plan deterministic when two snapshots share a start
//! time.
//!
//! # Pending snapshots
//!
//! A dry run creates nothing, so the listing lacks the snapshot a real run
//! would have just taken of each volume. Those volumes are planned with one
//! slot reserved for it, which makes the preview delete what the real run
//! deletes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{error, info};

use crate::config::RunConfig;
use crate::ec2::Ec2Api;
use crate::error::{Result, SnapshotError};
use crate::report::{PruneReport, ResourceFailure};
use crate::types::{Provenance, Snapshot};

/// Retention decision for one volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeRetention {
    pub volume_id: String,
    /// Oldest first
    pub delete: Vec<Snapshot>,
    /// Oldest first
    pub keep: Vec<Snapshot>,
}

/// Retention decisions for every volume with tool-created snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPlan {
    pub keep_per_volume: usize,
    /// Sorted by volume id
    pub volumes: Vec<VolumeRetention>,
}

impl RetentionPlan {
    /// All deletions, volume by volume, oldest first within each volume.
    pub fn deletions(&self) -> impl Iterator<Item = &Snapshot> {
        self.volumes.iter().flat_map(|v| v.delete.iter())
    }

    pub fn deletion_count(&self) -> usize {
        self.volumes.iter().map(|v| v.delete.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.deletion_count() == 0
    }
}

impl fmt::Display for RetentionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} volume(s), keep {} each, delete {}",
            self.volumes.len(),
            self.keep_per_volume,
            self.deletion_count()
        )
    }
}

/// Decide which snapshots to delete so each volume keeps at most
/// `keep_per_volume` of its newest snapshots.
///
/// Pure: performs no I/O.
pub fn plan_retention(snapshots: Vec<Snapshot>, keep_per_volume: usize) -> RetentionPlan {
    plan_retention_with_pending(snapshots, keep_per_volume, &BTreeSet::new())
}

/// Like [`plan_retention`], but volumes in `pending` are about to receive one
/// more snapshot that `snapshots` does not contain yet, so one fewer of the
/// listed ones is kept.
pub fn plan_retention_with_pending(
    snapshots: Vec<Snapshot>,
    keep_per_volume: usize,
    pending: &BTreeSet<&str>,
) -> RetentionPlan {
    let mut by_volume: BTreeMap<String, Vec<Snapshot>> = BTreeMap::new();
    for snapshot in snapshots {
        by_volume
            .entry(snapshot.volume_id.clone())
            .or_default()
            .push(snapshot);
    }

    let volumes = by_volume
        .into_iter()
        .map(|(volume_id, mut snapshots)| {
            snapshots.sort_by(|a, b| {
                a.start_time
                    .cmp(&b.start_time)
                    .then_with(|| a.snapshot_id.cmp(&b.snapshot_id))
            });
            let keep_listed = if pending.contains(volume_id.as_str()) {
                keep_per_volume.saturating_sub(1)
            } else {
                keep_per_volume
            };
            let excess = snapshots.len().saturating_sub(keep_listed);
            let keep = snapshots.split_off(excess);
            VolumeRetention {
                volume_id,
                delete: snapshots,
                keep,
            }
        })
        .collect();

    RetentionPlan {
        keep_per_volume,
        volumes,
    }
}

/// Deletes the oldest tool-created snapshots beyond the retention count.
pub struct SnapshotPruner<'a, A: Ec2Api + ?Sized> {
    api: &'a A,
    config: &'a RunConfig,
    pending: &'a [String],
}

impl<'a, A: Ec2Api + ?Sized> SnapshotPruner<'a, A> {
    pub fn new(api: &'a A, config: &'a RunConfig) -> Self {
        Self {
            api,
            config,
            pending: &[],
        }
    }

    /// Volumes that would have received a new snapshot this run but did not
    /// because it is a dry run.
    pub fn with_pending(mut self, volume_ids: &'a [String]) -> Self {
        self.pending = volume_ids;
        self
    }

    /// List this selector's snapshots, then delete per volume down to the
    /// retention count.
    ///
    /// # Errors
    ///
    /// Fails only when the snapshot listing fails; without it nothing can be
    /// pruned. Individual deletion failures are recorded in the report.
    pub fn run(&self) -> Result<PruneReport> {
        let selector = &self.config.selector;
        let snapshots = self
            .api
            .describe_snapshots(&selector.snapshot_filters())
            .map_err(|e| {
                error!(
                    selector = %selector,
                    error = %e,
                    "Getting all previously created snapshots failed"
                );
                SnapshotError::discovery("previously created snapshots", e)
            })?;

        let pending: BTreeSet<&str> = self.pending.iter().map(String::as_str).collect();
        let plan =
            plan_retention_with_pending(snapshots, self.config.num_backups as usize, &pending);
        info!(selector = %selector, plan = %plan, "Retention plan calculated");

        let mut report = PruneReport {
            volumes_examined: plan.volumes.len(),
            ..PruneReport::default()
        };

        for snapshot in plan.deletions() {
            let origin = Provenance::from_tags(&snapshot.tags, selector);
            let origin_instance = origin.as_ref().map_or("unknown", |p| p.instance_id.as_str());

            if self.config.dry_run {
                info!(
                    snapshot_id = %snapshot.snapshot_id,
                    start_time = %snapshot.start_time,
                    volume_id = %snapshot.volume_id,
                    origin_instance = %origin_instance,
                    "Dry run: would delete snapshot"
                );
                report.would_delete.push(snapshot.clone());
                continue;
            }

            match self.api.delete_snapshot(&snapshot.snapshot_id) {
                Ok(()) => {
                    info!(
                        snapshot_id = %snapshot.snapshot_id,
                        start_time = %snapshot.start_time,
                        volume_id = %snapshot.volume_id,
                        origin_instance = %origin_instance,
                        "Successfully deleted snapshot"
                    );
                    report.deleted.push(snapshot.clone());
                }
                Err(e) => {
                    error!(
                        snapshot_id = %snapshot.snapshot_id,
                        start_time = %snapshot.start_time,
                        volume_id = %snapshot.volume_id,
                        error = %e,
                        "Deleting snapshot failed"
                    );
                    report
                        .failures
                        .push(ResourceFailure::new(snapshot.snapshot_id.as_str(), e));
                }
            }
        }

        info!(
            volumes = report.volumes_examined,
            deleted = report.deleted.len(),
            failures = report.failures.len(),
            "Snapshot rotation finished"
        );
        Ok(report)
    }
}
