//! `Ec2Api` backed by the AWS SDK.
//!
//! The SDK is async; this client owns a current-thread tokio runtime and
//! blocks on each request so the rest of the crate stays synchronous.

use aws_config::BehaviorVersion;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::config::{Credentials, Region};
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types::{Filter, Tag as SdkTag};
use chrono::{DateTime, Utc};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, warn};

use super::{ApiError, ApiOperation, Ec2Api};
use crate::config::ClientConfig;
use crate::error::SnapshotError;
use crate::types::{
    Attachment, Instance, Snapshot, Tag, TagFilter, Volume, VolumeQuery, VolumeStatus,
};

/// Provider name reported for credentials given on the command line.
const STATIC_CREDENTIALS_PROVIDER: &str = "command-line";

/// EC2 client for one region.
pub struct AwsEc2Client {
    runtime: Runtime,
    client: Client,
}

impl AwsEc2Client {
    /// Build a client from explicit settings, falling back to the ambient AWS
    /// configuration (environment, shared config files, instance profile) for
    /// anything not set.
    ///
    /// # Errors
    ///
    /// - The async runtime cannot be started
    /// - No region is set explicitly or in the ambient configuration
    pub fn connect(config: &ClientConfig) -> Result<Self, SnapshotError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                SnapshotError::connect(format!("failed to start async runtime: {}", e))
            })?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(keys) = &config.credentials {
            loader = loader.credentials_provider(Credentials::new(
                keys.access_key_id.clone(),
                keys.secret_access_key.clone(),
                None,
                None,
                STATIC_CREDENTIALS_PROVIDER,
            ));
        }

        let sdk_config = runtime.block_on(loader.load());
        let Some(region) = sdk_config.region() else {
            return Err(SnapshotError::connect(
                "no AWS region configured; pass --region or set one in the AWS config",
            ));
        };
        debug!(region = %region, profile = ?config.profile, "EC2 client configured");

        Ok(Self {
            client: Client::new(&sdk_config),
            runtime,
        })
    }
}

fn api_error<E>(operation: ApiOperation, err: E) -> ApiError
where
    E: std::error::Error,
{
    ApiError::new(operation, DisplayErrorContext(&err).to_string())
}

fn sdk_filter(name: impl Into<String>, value: impl Into<String>) -> Filter {
    Filter::builder().name(name).values(value).build()
}

fn from_sdk_tags(tags: &[SdkTag]) -> Vec<Tag> {
    tags.iter()
        .filter_map(|tag| Some(Tag::new(tag.key()?, tag.value().unwrap_or_default())))
        .collect()
}

fn next_page(token: Option<&str>) -> Option<String> {
    token.filter(|t| !t.is_empty()).map(str::to_string)
}

impl Ec2Api for AwsEc2Client {
    fn describe_instances(&self, filter: &TagFilter) -> Result<Vec<Instance>, ApiError> {
        let mut instances = Vec::new();
        let mut next_token = None;
        loop {
            let output = self
                .runtime
                .block_on(
                    self.client
                        .describe_instances()
                        .filters(sdk_filter(filter.filter_name(), &filter.value))
                        .set_next_token(next_token)
                        .send(),
                )
                .map_err(|e| api_error(ApiOperation::DescribeInstances, e))?;

            for reservation in output.reservations() {
                for instance in reservation.instances() {
                    let Some(instance_id) = instance.instance_id() else {
                        continue;
                    };
                    instances.push(Instance {
                        instance_id: instance_id.to_string(),
                        tags: from_sdk_tags(instance.tags()),
                    });
                }
            }

            next_token = next_page(output.next_token());
            if next_token.is_none() {
                break;
            }
        }
        Ok(instances)
    }

    fn describe_volumes(&self, query: &VolumeQuery) -> Result<Vec<Volume>, ApiError> {
        let mut volumes = Vec::new();
        let mut next_token = None;
        loop {
            let output = self
                .runtime
                .block_on(
                    self.client
                        .describe_volumes()
                        .filters(sdk_filter("attachment.instance-id", &query.instance_id))
                        .filters(sdk_filter("status", query.status.to_string()))
                        .set_next_token(next_token)
                        .send(),
                )
                .map_err(|e| api_error(ApiOperation::DescribeVolumes, e))?;

            for volume in output.volumes() {
                let Some(volume_id) = volume.volume_id() else {
                    continue;
                };
                let status = volume
                    .state()
                    .and_then(|s| s.as_str().parse::<VolumeStatus>().ok());
                let Some(status) = status else {
                    warn!(volume_id, state = ?volume.state(), "Skipping volume in unknown state");
                    continue;
                };
                let attachments = volume
                    .attachments()
                    .iter()
                    .map(|att| Attachment {
                        device: att.device().unwrap_or_default().to_string(),
                        instance_id: att.instance_id().unwrap_or_default().to_string(),
                    })
                    .collect();
                volumes.push(Volume {
                    volume_id: volume_id.to_string(),
                    status,
                    attachments,
                });
            }

            next_token = next_page(output.next_token());
            if next_token.is_none() {
                break;
            }
        }
        Ok(volumes)
    }

    fn create_snapshot(
        &self,
        volume_id: &str,
        description: &str,
    ) -> Result<String, ApiError> {
        let output = self
            .runtime
            .block_on(
                self.client
                    .create_snapshot()
                    .volume_id(volume_id)
                    .description(description)
                    .send(),
            )
            .map_err(|e| api_error(ApiOperation::CreateSnapshot, e))?;

        output.snapshot_id().map(str::to_string).ok_or_else(|| {
            ApiError::new(ApiOperation::CreateSnapshot, "response carried no snapshot id")
        })
    }

    fn create_tags(&self, resource_id: &str, tags: &[Tag]) -> Result<(), ApiError> {
        let sdk_tags = tags
            .iter()
            .map(|tag| SdkTag::builder().key(&tag.key).value(&tag.value).build())
            .collect();
        self.runtime
            .block_on(
                self.client
                    .create_tags()
                    .resources(resource_id)
                    .set_tags(Some(sdk_tags))
                    .send(),
            )
            .map_err(|e| api_error(ApiOperation::CreateTags, e))?;
        Ok(())
    }

    fn describe_snapshots(&self, filters: &[TagFilter]) -> Result<Vec<Snapshot>, ApiError> {
        let sdk_filters: Vec<Filter> = filters
            .iter()
            .map(|f| sdk_filter(f.filter_name(), &f.value))
            .collect();

        let mut snapshots = Vec::new();
        let mut next_token = None;
        loop {
            let output = self
                .runtime
                .block_on(
                    self.client
                        .describe_snapshots()
                        .owner_ids("self")
                        .set_filters(Some(sdk_filters.clone()))
                        .set_next_token(next_token)
                        .send(),
                )
                .map_err(|e| api_error(ApiOperation::DescribeSnapshots, e))?;

            for snapshot in output.snapshots() {
                let (Some(snapshot_id), Some(volume_id)) =
                    (snapshot.snapshot_id(), snapshot.volume_id())
                else {
                    continue;
                };
                let Some(start_time) = snapshot
                    .start_time()
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
                else {
                    warn!(snapshot_id, volume_id, "Skipping snapshot without a start time");
                    continue;
                };
                snapshots.push(Snapshot {
                    snapshot_id: snapshot_id.to_string(),
                    volume_id: volume_id.to_string(),
                    start_time,
                    tags: from_sdk_tags(snapshot.tags()),
                });
            }

            next_token = next_page(output.next_token());
            if next_token.is_none() {
                break;
            }
        }
        Ok(snapshots)
    }

    fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), ApiError> {
        self.runtime
            .block_on(self.client.delete_snapshot().snapshot_id(snapshot_id).send())
            .map_err(|e| api_error(ApiOperation::DeleteSnapshot, e))?;
        Ok(())
    }
}
