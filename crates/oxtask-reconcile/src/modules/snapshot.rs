use super::{project_scope, required};
use oxtask_core::resources::{IdentityCreate, SnapshotCreate};
use oxtask_core::{validate_name, ApiToken, Desired, DesiredState, ResourceKind, ResourceSpec, Task};
use serde::Deserialize;

/// Parameters of `oxide_snapshot`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotParams {
    #[serde(default)]
    pub oxide_host: Option<String>,
    #[serde(default)]
    pub oxide_token: Option<ApiToken>,
    pub name: String,
    #[serde(default)]
    pub state: DesiredState,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Name or id of the disk to snapshot
    #[serde(default)]
    pub disk: Option<String>,
}

impl SnapshotParams {
    pub fn task(&self) -> oxtask_core::Result<Task> {
        validate_name(&self.name)?;
        let scope = project_scope(&self.project, "snapshots")?;

        let desired = match self.state {
            DesiredState::Absent => Desired::Absent,
            DesiredState::Present => {
                let disk = required(&self.disk, "disk")?;
                if uuid::Uuid::parse_str(&disk).is_err() {
                    validate_name(&disk)?;
                }
                Desired::Present(ResourceSpec::Snapshot(SnapshotCreate {
                    identity: IdentityCreate::new(&self.name, &self.description),
                    disk,
                }))
            }
        };

        Ok(Task::new(ResourceKind::Snapshot, scope, &self.name, desired))
    }
}
