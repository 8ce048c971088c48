use super::{project_scope, required};
use oxtask_core::resources::quantities::gib_to_bytes;
use oxtask_core::resources::{DiskCreate, DiskSource, IdentityCreate};
use oxtask_core::{validate_name, ApiToken, Desired, DesiredState, ResourceKind, ResourceSpec, Task};
use serde::Deserialize;

/// Parameters of `oxide_disk`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiskParams {
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
    /// Size in GiB
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub disk_source: Option<DiskSource>,
}

impl DiskParams {
    pub fn task(&self) -> oxtask_core::Result<Task> {
        validate_name(&self.name)?;
        let scope = project_scope(&self.project, "disks")?;

        let desired = match self.state {
            DesiredState::Absent => Desired::Absent,
            DesiredState::Present => {
                let size = gib_to_bytes("size", required(&self.size, "size")?)?;
                let disk_source = required(&self.disk_source, "disk_source")?;
                Desired::Present(ResourceSpec::Disk(DiskCreate {
                    identity: IdentityCreate::new(&self.name, &self.description),
                    disk_source,
                    size,
                }))
            }
        };

        Ok(Task::new(ResourceKind::Disk, scope, &self.name, desired))
    }
}
