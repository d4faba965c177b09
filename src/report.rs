//! Outcome records for the two phases of a run.
//!
//! Failures of single create/tag/delete calls never abort a phase. They end up
//! here, next to what did succeed, so callers and tests can inspect exactly
//! what happened without parsing logs.

use crate::ec2::{ApiError, ApiOperation};
use crate::types::Snapshot;

/// A single EC2 call that failed and was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFailure {
    /// Instance, volume or snapshot the call was about
    pub resource_id: String,
    pub error: ApiError,
}

impl ResourceFailure {
    pub fn new(resource_id: impl Into<String>, error: ApiError) -> Self {
        Self {
            resource_id: resource_id.into(),
            error,
        }
    }

    pub fn operation(&self) -> ApiOperation {
        self.error.operation
    }
}

/// A snapshot started by the creator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSnapshot {
    pub snapshot_id: String,
    pub volume_id: String,
    pub instance_id: String,
    /// Value of the `Name` tag
    pub name: String,
    /// False when the snapshot exists but tagging it failed
    pub tagged: bool,
}

/// What the creator did across all matching instances.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateReport {
    pub created: Vec<CreatedSnapshot>,
    pub failures: Vec<ResourceFailure>,
    /// Tagged instances that had no in-use volumes
    pub instances_without_volumes: Vec<String>,
    /// Volumes that would have been snapshotted in a dry run
    pub would_snapshot: Vec<String>,
}

impl CreateReport {
    /// Snapshots that exist but carry no provenance tags, so the pruner will
    /// never see them.
    pub fn untagged(&self) -> impl Iterator<Item = &CreatedSnapshot> {
        self.created.iter().filter(|s| !s.tagged)
    }
}

/// Result of the creation phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// No instance carries the selector tag; nothing to do this run.
    NoInstances,
    Completed(CreateReport),
}

/// What the pruner did across all volumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Distinct volumes with at least one tool-created snapshot
    pub volumes_examined: usize,
    pub deleted: Vec<Snapshot>,
    pub failures: Vec<ResourceFailure>,
    /// Snapshots that would have been deleted in a dry run
    pub would_delete: Vec<Snapshot>,
}

/// Result of a full run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub create: CreateOutcome,
    /// `None` when the run stopped after finding no instances
    pub prune: Option<PruneReport>,
}

impl RunReport {
    /// Count of skipped per-resource failures across both phases.
    pub fn failure_count(&self) -> usize {
        let create = match &self.create {
            CreateOutcome::Completed(report) => report.failures.len(),
            CreateOutcome::NoInstances => 0,
        };
        create + self.prune.as_ref().map_or(0, |p| p.failures.len())
    }
}
