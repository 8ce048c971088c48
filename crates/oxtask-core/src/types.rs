use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::resources::ResourceSpec;

/// A category of remote object managed through the Oxide API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Disk,
    Image,
    Instance,
    Project,
    Snapshot,
    SshKey,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Disk,
        ResourceKind::Image,
        ResourceKind::Instance,
        ResourceKind::Project,
        ResourceKind::Snapshot,
        ResourceKind::SshKey,
    ];

    /// Collection path below `/v1` (e.g. "disks", "me/ssh-keys")
    pub fn collection(&self) -> &'static str {
        match self {
            ResourceKind::Disk => "disks",
            ResourceKind::Image => "images",
            ResourceKind::Instance => "instances",
            ResourceKind::Project => "projects",
            ResourceKind::Snapshot => "snapshots",
            ResourceKind::SshKey => "me/ssh-keys",
        }
    }

    /// Full collection path, e.g. "/v1/disks"
    pub fn collection_path(&self) -> String {
        format!("/v1/{}", self.collection())
    }

    /// Path of a single resource selected by name or id
    pub fn item_path(&self, name_or_id: &str) -> String {
        format!("/v1/{}/{}", self.collection(), name_or_id)
    }

    /// Whether the API offers an update endpoint for the mutable identity fields
    pub fn supports_update(&self) -> bool {
        matches!(self, ResourceKind::Project)
    }

    /// Human readable label used in result messages
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Disk => "Disk",
            ResourceKind::Image => "Image",
            ResourceKind::Instance => "Instance",
            ResourceKind::Project => "Project",
            ResourceKind::Snapshot => "Snapshot",
            ResourceKind::SshKey => "SSH key",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Disk => "disk",
            ResourceKind::Image => "image",
            ResourceKind::Instance => "instance",
            ResourceKind::Project => "project",
            ResourceKind::Snapshot => "snapshot",
            ResourceKind::SshKey => "ssh_key",
        };
        write!(f, "{}", s)
    }
}

/// Namespace in which resource names are unique
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Silo-wide collections (projects)
    Silo,
    /// Collections owned by the authenticated user (SSH keys)
    CurrentUser,
    /// Project-scoped collections, selected by project name or id
    Project(String),
}

impl Scope {
    /// Query parameters selecting this scope on list and create calls
    pub fn query(&self) -> Vec<(String, String)> {
        match self {
            Scope::Project(project) => vec![("project".to_string(), project.clone())],
            Scope::Silo | Scope::CurrentUser => Vec::new(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Silo => write!(f, "silo"),
            Scope::CurrentUser => write!(f, "current user"),
            Scope::Project(project) => write!(f, "project '{}'", project),
        }
    }
}

/// Target existence condition for a named resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesiredState {
    #[default]
    Present,
    Absent,
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesiredState::Present => write!(f, "present"),
            DesiredState::Absent => write!(f, "absent"),
        }
    }
}

/// The API's representation of an existing resource.
///
/// Identity fields are typed; everything kind-specific (size, block_size,
/// project_id, run_state, ...) is kept as-is in `attributes` so the record can
/// be handed back to the caller without loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_modified: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl ResourceRecord {
    /// Look up a kind-specific attribute
    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }
}

/// Bearer token for the Oxide API. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building the Authorization header
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiToken(<redacted>)")
    }
}

/// What a task asks for: a spec to converge on, or removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Desired {
    Present(ResourceSpec),
    Absent,
}

impl Desired {
    pub fn state(&self) -> DesiredState {
        match self {
            Desired::Present(_) => DesiredState::Present,
            Desired::Absent => DesiredState::Absent,
        }
    }
}

/// A validated request to converge one named resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub kind: ResourceKind,
    pub scope: Scope,
    pub name: String,
    pub desired: Desired,
}

impl Task {
    pub fn new(kind: ResourceKind, scope: Scope, name: impl Into<String>, desired: Desired) -> Self {
        Self {
            kind,
            scope,
            name: name.into(),
            desired,
        }
    }
}

/// One page of a paginated list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsPage<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub next_page: Option<String>,
}

/// Write the reconciler would have issued outside check mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannedAction::Create => write!(f, "created"),
            PlannedAction::Update => write!(f, "updated"),
            PlannedAction::Delete => write!(f, "deleted"),
        }
    }
}

/// Result of converging one resource. Failures travel as `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationOutcome {
    /// Nothing to do; carries the existing record when there is one
    Unchanged {
        record: Option<ResourceRecord>,
        warnings: Vec<String>,
    },
    Created(ResourceRecord),
    Updated(ResourceRecord),
    Deleted(Uuid),
    /// Check mode: the write that would have been issued
    Planned(PlannedAction),
}

impl ReconciliationOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, ReconciliationOutcome::Unchanged { .. })
    }
}
