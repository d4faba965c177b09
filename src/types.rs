//! Domain types for instances, volumes and snapshots
//!
//! These are provider-neutral views of the EC2 resources the tool reads and
//! writes. The `ec2` module converts SDK shapes into them; everything else in
//! the crate only sees these.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use strum::{Display, EnumIter, EnumString};

/// Value of the `Creator` tag put on every snapshot this tool makes.
pub const CREATOR: &str = "ebs_snapshot_automation";

/// Tag keys forming the snapshot provenance contract.
pub const NAME_TAG: &str = "Name";
pub const CREATOR_TAG: &str = "Creator";
pub const ORIGIN_INSTANCE_TAG: &str = "Origin-Instance";
pub const ORIGIN_TAG_PREFIX: &str = "Origin-";

/// A key/value tag on an EC2 resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A `tag:<key>` filter matching resources whose tag equals `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    pub key: String,
    pub value: String,
}

impl TagFilter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Filter name as the EC2 API expects it (`tag:Lifecycle`).
    pub fn filter_name(&self) -> String {
        format!("tag:{}", self.key)
    }
}

/// Selector used to pick instances and to re-find their snapshots.
///
/// Parsed from `key:value`. Exactly one colon is allowed and the key must not
/// be empty; the value may be empty since EC2 permits empty tag values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    key: String,
    value: String,
}

impl Selector {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self, SelectorError> {
        let key = key.into();
        let value = value.into();
        if key.trim().is_empty() {
            return Err(SelectorError::EmptyKey(format!("{}:{}", key, value)));
        }
        if key.contains(':') || value.contains(':') {
            return Err(SelectorError::Malformed(format!("{}:{}", key, value)));
        }
        Ok(Self { key, value })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Filter selecting instances that carry this tag.
    pub fn instance_filter(&self) -> TagFilter {
        TagFilter::new(&self.key, &self.value)
    }

    /// Key of the tag that records this selector on a snapshot.
    pub fn origin_tag_key(&self) -> String {
        format!("{}{}", ORIGIN_TAG_PREFIX, self.key)
    }

    /// Filters matching every snapshot this tool created under this selector.
    pub fn snapshot_filters(&self) -> Vec<TagFilter> {
        vec![
            TagFilter::new(CREATOR_TAG, CREATOR),
            TagFilter::new(self.origin_tag_key(), &self.value),
        ]
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key, self.value)
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split(':').collect::<Vec<_>>().as_slice() {
            [key, value] => Selector::new(*key, *value),
            _ => Err(SelectorError::Malformed(s.to_string())),
        }
    }
}

/// Error for selector strings that are not a single `key:value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// Not exactly one colon.
    Malformed(String),
    /// Nothing before the colon.
    EmptyKey(String),
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorError::Malformed(s) => {
                write!(f, "Given tag key value \"{}\" is invalid, expected key:value", s)
            }
            SelectorError::EmptyKey(s) => {
                write!(f, "Given tag key value \"{}\" has an empty key", s)
            }
        }
    }
}

impl std::error::Error for SelectorError {}

/// An EC2 instance as seen by the creator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub instance_id: String,
    pub tags: Vec<Tag>,
}

impl Instance {
    /// Value of the first `Name` tag, if any.
    pub fn name(&self) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.key == NAME_TAG)
            .map(|tag| tag.value.as_str())
    }
}

/// EBS volume state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum VolumeStatus {
    Creating,
    Available,
    InUse,
    Deleting,
    Deleted,
    Error,
}

/// One attachment of a volume to an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub device: String,
    pub instance_id: String,
}

/// An EBS volume with its attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub volume_id: String,
    pub status: VolumeStatus,
    pub attachments: Vec<Attachment>,
}

impl Volume {
    /// Attachment device paths, comma separated (`/dev/sda1, /dev/xvdf`).
    pub fn devices(&self) -> String {
        self.attachments
            .iter()
            .map(|att| att.device.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Ids of the instances this volume is attached to, comma separated.
    pub fn attached_instances(&self) -> String {
        self.attachments
            .iter()
            .map(|att| att.instance_id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Which volumes to list: those attached to an instance with a given status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeQuery {
    pub instance_id: String,
    pub status: VolumeStatus,
}

impl VolumeQuery {
    /// Volumes currently in use by `instance_id`.
    pub fn in_use_by(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            status: VolumeStatus::InUse,
        }
    }
}

/// An EBS snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub snapshot_id: String,
    pub volume_id: String,
    pub start_time: DateTime<Utc>,
    pub tags: Vec<Tag>,
}

/// Where a snapshot came from: the instance it was taken of and the selector
/// that picked that instance.
///
/// Tags are the only link back from a snapshot to its selector, so this type
/// renders the exact tag set that the pruner later filters on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub instance_id: String,
    pub selector: Selector,
}

impl Provenance {
    pub fn new(instance_id: impl Into<String>, selector: Selector) -> Self {
        Self {
            instance_id: instance_id.into(),
            selector,
        }
    }

    /// Full tag set for a snapshot, with `name` as its `Name` tag.
    pub fn tags(&self, name: impl Into<String>) -> Vec<Tag> {
        vec![
            Tag::new(NAME_TAG, name),
            Tag::new(CREATOR_TAG, CREATOR),
            Tag::new(ORIGIN_INSTANCE_TAG, &self.instance_id),
            Tag::new(self.selector.origin_tag_key(), self.selector.value()),
        ]
    }

    /// Recover provenance from a snapshot's tags, if they carry it for `selector`.
    pub fn from_tags(tags: &[Tag], selector: &Selector) -> Option<Self> {
        let lookup = |key: &str| tags.iter().find(|t| t.key == key).map(|t| t.value.as_str());
        if lookup(CREATOR_TAG) != Some(CREATOR) {
            return None;
        }
        if lookup(&selector.origin_tag_key()) != Some(selector.value()) {
            return None;
        }
        let instance_id = lookup(ORIGIN_INSTANCE_TAG)?;
        Some(Self::new(instance_id, selector.clone()))
    }
}
