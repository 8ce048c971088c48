//! Create-time request bodies, shaped the way the Oxide API expects them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Common identifying metadata sent with every create call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityCreate {
    pub name: String,
    pub description: String,
}

impl IdentityCreate {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Disk block size in bytes. Only 512, 2048 and 4096 are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BlockSize(u32);

impl BlockSize {
    pub const VALID: [u32; 3] = [512, 2048, 4096];
}

impl Default for BlockSize {
    fn default() -> Self {
        Self(512)
    }
}

impl TryFrom<u32> for BlockSize {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if Self::VALID.contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!(
                "invalid block_size {}; valid values are 512, 2048 or 4096",
                value
            ))
        }
    }
}

impl From<BlockSize> for u32 {
    fn from(value: BlockSize) -> Self {
        value.0
    }
}

/// Initial contents of a new disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum DiskSource {
    /// Blank disk
    Blank {
        #[serde(default)]
        block_size: BlockSize,
    },
    /// Disk restored from a snapshot
    Snapshot { snapshot_id: Uuid },
    /// Disk populated from an image
    Image { image_id: Uuid },
    /// Blank disk that accepts bulk writes
    ImportingBlocks {
        #[serde(default)]
        block_size: BlockSize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskCreate {
    #[serde(flatten)]
    pub identity: IdentityCreate,
    pub disk_source: DiskSource,
    /// Size in bytes
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    Snapshot { id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageCreate {
    #[serde(flatten)]
    pub identity: IdentityCreate,
    /// Operating system family, e.g. "ubuntu"
    pub os: String,
    pub version: String,
    pub source: ImageSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstanceDiskAttachment {
    /// Create the disk as part of instance creation
    Create(DiskCreate),
    /// Attach an existing disk by name
    Attach { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceCreate {
    #[serde(flatten)]
    pub identity: IdentityCreate,
    pub hostname: String,
    /// Memory in bytes
    pub memory: u64,
    pub ncpus: u16,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub disks: Vec<InstanceDiskAttachment>,
    /// Allowlist of the user's SSH keys; omitted means all of them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_public_keys: Option<Vec<String>>,
    pub start: bool,
    /// Base64-encoded cloud-init payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectCreate {
    #[serde(flatten)]
    pub identity: IdentityCreate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotCreate {
    #[serde(flatten)]
    pub identity: IdentityCreate,
    /// Name or id of the disk to snapshot
    pub disk: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SshKeyCreate {
    #[serde(flatten)]
    pub identity: IdentityCreate,
    pub public_key: String,
}

/// Updatable identity fields (only used for projects)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityUpdate {
    pub description: String,
}
