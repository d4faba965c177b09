// Shared fixtures for the integration tests: an in-memory EC2 fake that
// records every call and can be told to fail specific ones.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::io::Write;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use tracing_subscriber::fmt::MakeWriter;

use ebs_snapshot_automation::{
    ApiError, ApiOperation, Attachment, Clock, Ec2Api, Instance, Snapshot, Tag, TagFilter, Volume,
    VolumeQuery, VolumeStatus,
};

/// One recorded EC2 call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DescribeInstances(TagFilter),
    DescribeVolumes(VolumeQuery),
    CreateSnapshot { volume_id: String, description: String },
    CreateTags { resource_id: String, tags: Vec<Tag> },
    DescribeSnapshots(Vec<TagFilter>),
    DeleteSnapshot(String),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::CreateSnapshot { .. } | Call::CreateTags { .. } | Call::DeleteSnapshot(_)
        )
    }
}

/// Wildcard resource for `FakeEc2::fail_on`.
pub const ANY: &str = "*";

/// In-memory EC2. Snapshots created through it become visible to later
/// `describe_snapshots` calls, so a full run can be exercised end to end.
#[derive(Default)]
pub struct FakeEc2 {
    instances: Vec<Instance>,
    volumes: Vec<Volume>,
    snapshots: RefCell<Vec<Snapshot>>,
    failures: RefCell<HashSet<(ApiOperation, String)>>,
    calls: RefCell<Vec<Call>>,
    next_snapshot: Cell<u32>,
}

impl FakeEc2 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instance(mut self, instance_id: &str, tags: &[(&str, &str)]) -> Self {
        self.instances.push(Instance {
            instance_id: instance_id.to_string(),
            tags: tags.iter().map(|(k, v)| Tag::new(*k, *v)).collect(),
        });
        self
    }

    pub fn with_volume(mut self, volume_id: &str, instance_id: &str, device: &str) -> Self {
        self.volumes.push(Volume {
            volume_id: volume_id.to_string(),
            status: VolumeStatus::InUse,
            attachments: vec![Attachment {
                device: device.to_string(),
                instance_id: instance_id.to_string(),
            }],
        });
        self
    }

    pub fn with_detached_volume(mut self, volume_id: &str) -> Self {
        self.volumes.push(Volume {
            volume_id: volume_id.to_string(),
            status: VolumeStatus::Available,
            attachments: Vec::new(),
        });
        self
    }

    pub fn with_snapshot(self, snapshot: Snapshot) -> Self {
        self.snapshots.borrow_mut().push(snapshot);
        self
    }

    /// Make `operation` fail for `resource` (or for everything with `ANY`).
    pub fn fail_on(self, operation: ApiOperation, resource: &str) -> Self {
        self.failures
            .borrow_mut()
            .insert((operation, resource.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.calls.borrow().iter().filter(|c| c.is_mutation()).count()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    pub fn stored_snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn stored_ids_for(&self, volume_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .snapshots
            .borrow()
            .iter()
            .filter(|s| s.volume_id == volume_id)
            .map(|s| s.snapshot_id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn check(&self, operation: ApiOperation, resource: &str) -> Result<(), ApiError> {
        let failures = self.failures.borrow();
        if failures.contains(&(operation, resource.to_string()))
            || failures.contains(&(operation, ANY.to_string()))
        {
            return Err(ApiError::new(operation, format!("injected failure for {resource}")));
        }
        Ok(())
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

fn has_tag(tags: &[Tag], filter: &TagFilter) -> bool {
    tags.iter().any(|t| t.key == filter.key && t.value == filter.value)
}

impl Ec2Api for FakeEc2 {
    fn describe_instances(&self, filter: &TagFilter) -> Result<Vec<Instance>, ApiError> {
        self.record(Call::DescribeInstances(filter.clone()));
        self.check(ApiOperation::DescribeInstances, &filter.key)?;
        Ok(self
            .instances
            .iter()
            .filter(|i| has_tag(&i.tags, filter))
            .cloned()
            .collect())
    }

    fn describe_volumes(&self, query: &VolumeQuery) -> Result<Vec<Volume>, ApiError> {
        self.record(Call::DescribeVolumes(query.clone()));
        self.check(ApiOperation::DescribeVolumes, &query.instance_id)?;
        Ok(self
            .volumes
            .iter()
            .filter(|v| v.status == query.status)
            .filter(|v| v.attachments.iter().any(|a| a.instance_id == query.instance_id))
            .cloned()
            .collect())
    }

    fn create_snapshot(&self, volume_id: &str, description: &str) -> Result<String, ApiError> {
        self.record(Call::CreateSnapshot {
            volume_id: volume_id.to_string(),
            description: description.to_string(),
        });
        self.check(ApiOperation::CreateSnapshot, volume_id)?;

        let n = self.next_snapshot.get() + 1;
        self.next_snapshot.set(n);
        let snapshot_id = format!("snap-new{n:04}");
        self.snapshots.borrow_mut().push(Snapshot {
            snapshot_id: snapshot_id.clone(),
            volume_id: volume_id.to_string(),
            start_time: base_time() + Duration::days(1000) + Duration::minutes(n.into()),
            tags: Vec::new(),
        });
        Ok(snapshot_id)
    }

    fn create_tags(&self, resource_id: &str, tags: &[Tag]) -> Result<(), ApiError> {
        self.record(Call::CreateTags {
            resource_id: resource_id.to_string(),
            tags: tags.to_vec(),
        });
        self.check(ApiOperation::CreateTags, resource_id)?;

        let mut snapshots = self.snapshots.borrow_mut();
        let Some(snapshot) = snapshots.iter_mut().find(|s| s.snapshot_id == resource_id) else {
            return Err(ApiError::new(ApiOperation::CreateTags, "InvalidSnapshot.NotFound"));
        };
        for tag in tags {
            snapshot.tags.retain(|t| t.key != tag.key);
            snapshot.tags.push(tag.clone());
        }
        Ok(())
    }

    fn describe_snapshots(&self, filters: &[TagFilter]) -> Result<Vec<Snapshot>, ApiError> {
        self.record(Call::DescribeSnapshots(filters.to_vec()));
        self.check(ApiOperation::DescribeSnapshots, ANY)?;
        Ok(self
            .snapshots
            .borrow()
            .iter()
            .filter(|s| filters.iter().all(|f| has_tag(&s.tags, f)))
            .cloned()
            .collect())
    }

    fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), ApiError> {
        self.record(Call::DeleteSnapshot(snapshot_id.to_string()));
        self.check(ApiOperation::DeleteSnapshot, snapshot_id)?;

        let mut snapshots = self.snapshots.borrow_mut();
        let before = snapshots.len();
        snapshots.retain(|s| s.snapshot_id != snapshot_id);
        if snapshots.len() == before {
            return Err(ApiError::new(ApiOperation::DeleteSnapshot, "InvalidSnapshot.NotFound"));
        }
        Ok(())
    }
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2016, 3, 1, 4, 0, 0)
        .single()
        .expect("valid base time")
}

/// A snapshot this tool created under `Lifecycle:legacy`, `age_days` after the base time.
pub fn tool_snapshot(snapshot_id: &str, volume_id: &str, age_days: i64) -> Snapshot {
    Snapshot {
        snapshot_id: snapshot_id.to_string(),
        volume_id: volume_id.to_string(),
        start_time: base_time() + Duration::days(age_days),
        tags: vec![
            Tag::new("Name", format!("web1 /dev/sda1 day {age_days}")),
            Tag::new("Creator", "ebs_snapshot_automation"),
            Tag::new("Origin-Instance", "i-1"),
            Tag::new("Origin-Lifecycle", "legacy"),
        ],
    }
}

/// Clock frozen at a known local time.
pub struct FixedClock(pub NaiveDateTime);

impl FixedClock {
    pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Self {
        let time = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .expect("valid fixed clock time");
        Self(time)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// In-memory log sink for a scoped `tracing` subscriber.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().expect("log buffer poisoned").clone();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("log buffer poisoned").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` with a subscriber that captures everything it logs.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, buffer.contents())
}
