use oxtask_core::resources::{IdentityCreate, ProjectCreate};
use oxtask_core::{validate_name, ApiToken, Desired, DesiredState, ResourceKind, ResourceSpec, Scope, Task};
use serde::Deserialize;

/// Parameters of `oxide_project`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectParams {
    #[serde(default)]
    pub oxide_host: Option<String>,
    #[serde(default)]
    pub oxide_token: Option<ApiToken>,
    pub name: String,
    #[serde(default)]
    pub state: DesiredState,
    #[serde(default)]
    pub description: String,
}

impl ProjectParams {
    pub fn task(&self) -> oxtask_core::Result<Task> {
        validate_name(&self.name)?;

        let desired = match self.state {
            DesiredState::Absent => Desired::Absent,
            DesiredState::Present => Desired::Present(ResourceSpec::Project(ProjectCreate {
                identity: IdentityCreate::new(&self.name, &self.description),
            })),
        };

        Ok(Task::new(ResourceKind::Project, Scope::Silo, &self.name, desired))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let params: ProjectParams = serde_json::from_value(json!({ "name": "prod" })).unwrap();
        let task = params.task().unwrap();

        assert_eq!(task.scope, Scope::Silo);
        assert_eq!(task.desired.state(), DesiredState::Present);
        match task.desired {
            Desired::Present(spec) => assert_eq!(spec.description(), ""),
            Desired::Absent => panic!("expected present"),
        }
    }

    #[test]
    fn test_invalid_name() {
        let params: ProjectParams =
            serde_json::from_value(json!({ "name": "Prod", "state": "absent" })).unwrap();
        assert!(params.task().is_err());
    }
}
