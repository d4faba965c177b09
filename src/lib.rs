//! EBS Snapshot Automation Library
//!
//! Tag-driven snapshot creation and retention for EC2 instance volumes. Meant
//! to be run periodically (cron or similar); keeps no state of its own beyond
//! the tags it writes on the snapshots.

pub mod automation;
pub mod cli;
pub mod config;
pub mod creator;
pub mod ec2;
pub mod error;
pub mod logging;
pub mod pruner;
pub mod report;
pub mod types;

// Re-export main types for convenience
pub use automation::{run, run_with_clock};
pub use config::{ClientConfig, RunConfig, StaticCredentials};
pub use creator::{Clock, LocalClock, SnapshotCreator, snapshot_description, snapshot_name};
pub use ec2::{ApiError, ApiOperation, AwsEc2Client, Ec2Api};
pub use error::SnapshotError;
pub use pruner::{
    RetentionPlan, SnapshotPruner, VolumeRetention, plan_retention, plan_retention_with_pending,
};
pub use report::{
    CreateOutcome, CreateReport, CreatedSnapshot, PruneReport, ResourceFailure, RunReport,
};
pub use types::{
    Attachment, Instance, Provenance, Selector, SelectorError, Snapshot, Tag, TagFilter, Volume,
    VolumeQuery, VolumeStatus,
};
