//! Snapshot creation for tagged instances.
//!
//! For every instance carrying the selector tag, snapshots each of its in-use
//! volumes and tags the snapshot so the pruner can find it again.
//!
//! # Failure Policy
//!
//! | Failure                         | Effect |
//! |---------------------------------|--------|
//! | Listing instances               | Phase fails, run aborts |
//! | No matching instances           | Warning, run ends cleanly |
//! | Listing volumes of one instance | Logged, instance skipped |
//! | Instance without in-use volumes | Warning, instance skipped |
//! | Creating one snapshot           | Logged, volume skipped |
//! | Tagging one snapshot            | Logged, snapshot kept untagged |

use chrono::{Local, NaiveDateTime};
use tracing::{error, info, warn};

use crate::config::RunConfig;
use crate::ec2::Ec2Api;
use crate::error::{Result, SnapshotError};
use crate::report::{CreateOutcome, CreateReport, CreatedSnapshot, ResourceFailure};
use crate::types::{Instance, Provenance, Volume, VolumeQuery};

/// Format of the timestamp at the end of a snapshot's `Name` tag.
pub const NAME_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Source of the local wall-clock time used in snapshot names.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// The machine's local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Human-readable snapshot description.
///
/// `automated snapshot of volume vol-1 attached as /dev/sda1 to web1 (i-1)`,
/// or without the name part when the instance has no `Name` tag.
pub fn snapshot_description(volume: &Volume, instance_name: Option<&str>) -> String {
    let devices = volume.devices();
    let instances = volume.attached_instances();
    match instance_name {
        Some(name) => format!(
            "automated snapshot of volume {} attached as {} to {} ({})",
            volume.volume_id, devices, name, instances
        ),
        None => format!(
            "automated snapshot of volume {} attached as {} to {}",
            volume.volume_id, devices, instances
        ),
    }
}

/// Value of the snapshot `Name` tag: `<label> <devices> <YYYY-MM-DD HH:MM>`.
///
/// The label is the instance name, or the attached instance ids if unnamed.
pub fn snapshot_name(
    volume: &Volume,
    instance_name: Option<&str>,
    taken_at: NaiveDateTime,
) -> String {
    let label = match instance_name {
        Some(name) => name.to_string(),
        None => volume.attached_instances(),
    };
    format!(
        "{} {} {}",
        label,
        volume.devices(),
        taken_at.format(NAME_TIMESTAMP_FORMAT)
    )
}

/// Creates and tags snapshots for one selector.
pub struct SnapshotCreator<'a, A: Ec2Api + ?Sized> {
    api: &'a A,
    config: &'a RunConfig,
    clock: &'a dyn Clock,
}

impl<'a, A: Ec2Api + ?Sized> SnapshotCreator<'a, A> {
    pub fn new(api: &'a A, config: &'a RunConfig) -> Self {
        Self {
            api,
            config,
            clock: &LocalClock,
        }
    }

    /// Use `clock` for snapshot name timestamps.
    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Snapshot every in-use volume of every instance matching the selector.
    ///
    /// # Errors
    ///
    /// Only a failed instance listing is an error. Everything below that is
    /// recorded in the returned report.
    pub fn run(&self) -> Result<CreateOutcome> {
        let selector = &self.config.selector;
        let instances = self
            .api
            .describe_instances(&selector.instance_filter())
            .map_err(|e| {
                error!(
                    selector = %selector,
                    error = %e,
                    "Failed to get list of instances to back up"
                );
                SnapshotError::discovery("list of instances to back up", e)
            })?;

        if instances.is_empty() {
            warn!(
                selector = %selector,
                "Couldn't find any instances whose volumes need snapshotting"
            );
            return Ok(CreateOutcome::NoInstances);
        }
        info!(selector = %selector, count = instances.len(), "Found instances to back up");

        let mut report = CreateReport::default();
        for instance in &instances {
            self.snapshot_instance(instance, &mut report);
        }

        info!(
            created = report.created.len(),
            failures = report.failures.len(),
            without_volumes = report.instances_without_volumes.len(),
            "Snapshot creation finished"
        );
        Ok(CreateOutcome::Completed(report))
    }

    fn snapshot_instance(&self, instance: &Instance, report: &mut CreateReport) {
        let instance_id = instance.instance_id.as_str();
        let volumes = match self.api.describe_volumes(&VolumeQuery::in_use_by(instance_id)) {
            Ok(volumes) => volumes,
            Err(e) => {
                error!(
                    instance_id,
                    error = %e,
                    "Failed to get the list of volumes attached to instance"
                );
                report.failures.push(ResourceFailure::new(instance_id, e));
                return;
            }
        };

        if volumes.is_empty() {
            warn!(
                instance_id,
                "Found instance to back up, but no attached in-use volumes. Something is fishy here"
            );
            report.instances_without_volumes.push(instance_id.to_string());
            return;
        }

        let provenance = Provenance::new(instance_id, self.config.selector.clone());
        for volume in &volumes {
            self.snapshot_volume(instance, volume, &provenance, report);
        }
    }

    fn snapshot_volume(
        &self,
        instance: &Instance,
        volume: &Volume,
        provenance: &Provenance,
        report: &mut CreateReport,
    ) {
        let volume_id = volume.volume_id.as_str();
        let instance_name = instance.name();
        let description = snapshot_description(volume, instance_name);

        if self.config.dry_run {
            let name = snapshot_name(volume, instance_name, self.clock.now());
            info!(volume_id, %description, %name, "Dry run: would create snapshot");
            report.would_snapshot.push(volume_id.to_string());
            return;
        }

        let snapshot_id = match self.api.create_snapshot(volume_id, &description) {
            Ok(id) => id,
            Err(e) => {
                error!(volume_id, error = %e, "Creating a snapshot of volume failed");
                report.failures.push(ResourceFailure::new(volume_id, e));
                return;
            }
        };
        info!(snapshot_id = %snapshot_id, volume_id, "Creating snapshot of volume");

        let name = snapshot_name(volume, instance_name, self.clock.now());
        let tagged = match self.api.create_tags(&snapshot_id, &provenance.tags(name.as_str())) {
            Ok(()) => true,
            Err(e) => {
                error!(
                    snapshot_id = %snapshot_id,
                    volume_id,
                    error = %e,
                    "Tagging the snapshot of volume failed"
                );
                report.failures.push(ResourceFailure::new(snapshot_id.as_str(), e));
                false
            }
        };

        report.created.push(CreatedSnapshot {
            snapshot_id,
            volume_id: volume_id.to_string(),
            instance_id: instance.instance_id.clone(),
            name,
            tagged,
        });
    }
}
