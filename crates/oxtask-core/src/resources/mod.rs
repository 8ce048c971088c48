pub mod payloads;
pub mod quantities;

pub use payloads::{
    BlockSize, DiskCreate, DiskSource, IdentityCreate, IdentityUpdate, ImageCreate, ImageSource,
    InstanceCreate, InstanceDiskAttachment, ProjectCreate, SnapshotCreate, SshKeyCreate,
};

use crate::error::{CoreError, Result};
use crate::types::ResourceKind;
use serde::Serialize;

/// Longest name the API accepts
pub const MAX_NAME_LEN: usize = 63;

/// Desired state of a resource that should be present: one create payload per kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResourceSpec {
    Disk(DiskCreate),
    Image(ImageCreate),
    Instance(InstanceCreate),
    Project(ProjectCreate),
    Snapshot(SnapshotCreate),
    SshKey(SshKeyCreate),
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::Disk(_) => ResourceKind::Disk,
            ResourceSpec::Image(_) => ResourceKind::Image,
            ResourceSpec::Instance(_) => ResourceKind::Instance,
            ResourceSpec::Project(_) => ResourceKind::Project,
            ResourceSpec::Snapshot(_) => ResourceKind::Snapshot,
            ResourceSpec::SshKey(_) => ResourceKind::SshKey,
        }
    }

    pub fn identity(&self) -> &IdentityCreate {
        match self {
            ResourceSpec::Disk(d) => &d.identity,
            ResourceSpec::Image(i) => &i.identity,
            ResourceSpec::Instance(i) => &i.identity,
            ResourceSpec::Project(p) => &p.identity,
            ResourceSpec::Snapshot(s) => &s.identity,
            ResourceSpec::SshKey(k) => &k.identity,
        }
    }

    pub fn name(&self) -> &str {
        &self.identity().name
    }

    pub fn description(&self) -> &str {
        &self.identity().description
    }

    /// Serialize the create request body
    pub fn to_body(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| {
            CoreError::serialization_error(
                format!("Failed to serialize {} create request: {}", self.kind(), e),
                Some(Box::new(e)),
            )
        })
    }
}

/// Check a resource name against the API naming rules
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CoreError::invalid_name(
            name,
            "does not meet the minimum length of 1 character",
        ));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(CoreError::invalid_name(
            name,
            format!("exceeds the maximum length of {} characters", MAX_NAME_LEN),
        ));
    }

    let first = name.chars().next().unwrap_or_default();
    if !first.is_ascii_lowercase() {
        return Err(CoreError::invalid_name(
            name,
            "must begin with a lowercase ASCII letter",
        ));
    }

    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(CoreError::invalid_name(
            name,
            format!("contains invalid character '{}'", bad),
        ));
    }

    if name.ends_with('-') {
        return Err(CoreError::invalid_name(name, "may not end with '-'"));
    }

    if uuid::Uuid::parse_str(name).is_ok() {
        return Err(CoreError::invalid_name(
            name,
            "may contain a UUID but may not be one",
        ));
    }

    Ok(())
}

/// Boolean form of [`validate_name`]
pub fn is_valid_name(name: &str) -> bool {
    validate_name(name).is_ok()
}
