use super::{project_scope, required};
use oxtask_core::resources::{IdentityCreate, ImageCreate, ImageSource};
use oxtask_core::{
    validate_name, ApiToken, CoreError, Desired, DesiredState, ResourceKind, ResourceSpec, Task,
};
use serde::Deserialize;
use uuid::Uuid;

/// Parameters of `oxide_image`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageParams {
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
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub source: Option<ImageSourceParams>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageSourceParams {
    #[serde(default)]
    pub snapshot: Option<SnapshotRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotRef {
    #[serde(default)]
    pub id: Option<Uuid>,
}

impl ImageParams {
    pub fn task(&self) -> oxtask_core::Result<Task> {
        validate_name(&self.name)?;
        let scope = project_scope(&self.project, "images")?;

        let desired = match self.state {
            DesiredState::Absent => Desired::Absent,
            DesiredState::Present => {
                let os = non_empty(required(&self.os, "os")?, "os")?;
                let version = non_empty(required(&self.version, "version")?, "version")?;
                let snapshot_id = self
                    .source
                    .as_ref()
                    .and_then(|s| s.snapshot.as_ref())
                    .and_then(|s| s.id)
                    .ok_or_else(|| {
                        CoreError::missing_parameter("source.snapshot.id", "state=present")
                    })?;

                Desired::Present(ResourceSpec::Image(ImageCreate {
                    identity: IdentityCreate::new(&self.name, &self.description),
                    os,
                    version,
                    source: ImageSource::Snapshot { id: snapshot_id },
                }))
            }
        };

        Ok(Task::new(ResourceKind::Image, scope, &self.name, desired))
    }
}

fn non_empty(value: String, parameter: &str) -> oxtask_core::Result<String> {
    if value.trim().is_empty() {
        return Err(CoreError::validation_failed(
            parameter,
            "must not be empty",
            format!("Set '{}' to a non-empty string", parameter),
        ));
    }
    Ok(value)
}
