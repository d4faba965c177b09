//! EC2 API seam.
//!
//! The creator and pruner talk to EC2 only through the `Ec2Api` trait. The
//! production implementation is `AwsEc2Client`; tests supply a recording fake.
//!
//! # Contract
//!
//! - Every call is synchronous and performs at most one logical operation
//!   (listings may page internally).
//! - Every failure, transient or permanent, is reported as an `ApiError`
//!   carrying the operation and a human-readable message.
//! - Implementations never retry on their own beyond what the SDK does.

mod aws;

pub use aws::AwsEc2Client;

use strum::Display;
use thiserror::Error;

use crate::types::{Instance, Snapshot, Tag, TagFilter, Volume, VolumeQuery};

/// EC2 operations the tool issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ApiOperation {
    DescribeInstances,
    DescribeVolumes,
    CreateSnapshot,
    CreateTags,
    DescribeSnapshots,
    DeleteSnapshot,
}

/// A failed EC2 call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct ApiError {
    pub operation: ApiOperation,
    pub message: String,
}

impl ApiError {
    pub fn new(operation: ApiOperation, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// Read/write access to the EC2 resources this tool manages.
pub trait Ec2Api {
    /// Instances carrying the tag described by `filter`.
    fn describe_instances(&self, filter: &TagFilter) -> Result<Vec<Instance>, ApiError>;

    /// Volumes attached to `query.instance_id` in state `query.status`.
    fn describe_volumes(&self, query: &VolumeQuery) -> Result<Vec<Volume>, ApiError>;

    /// Start a snapshot of `volume_id` and return the new snapshot id.
    fn create_snapshot(&self, volume_id: &str, description: &str) -> Result<String, ApiError>;

    /// Attach `tags` to the resource, overwriting existing values for the same keys.
    fn create_tags(&self, resource_id: &str, tags: &[Tag]) -> Result<(), ApiError>;

    /// Snapshots owned by the caller that match every filter.
    fn describe_snapshots(&self, filters: &[TagFilter]) -> Result<Vec<Snapshot>, ApiError>;

    fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), ApiError>;
}

impl<T: Ec2Api + ?Sized> Ec2Api for &T {
    fn describe_instances(&self, filter: &TagFilter) -> Result<Vec<Instance>, ApiError> {
        (**self).describe_instances(filter)
    }

    fn describe_volumes(&self, query: &VolumeQuery) -> Result<Vec<Volume>, ApiError> {
        (**self).describe_volumes(query)
    }

    fn create_snapshot(&self, volume_id: &str, description: &str) -> Result<String, ApiError> {
        (**self).create_snapshot(volume_id, description)
    }

    fn create_tags(&self, resource_id: &str, tags: &[Tag]) -> Result<(), ApiError> {
        (**self).create_tags(resource_id, tags)
    }

    fn describe_snapshots(&self, filters: &[TagFilter]) -> Result<Vec<Snapshot>, ApiError> {
        (**self).describe_snapshots(filters)
    }

    fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), ApiError> {
        (**self).delete_snapshot(snapshot_id)
    }
}
