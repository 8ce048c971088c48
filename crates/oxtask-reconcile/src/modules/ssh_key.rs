use super::required;
use oxtask_core::resources::{IdentityCreate, SshKeyCreate};
use oxtask_core::{
    validate_name, ApiToken, CoreError, Desired, DesiredState, ResourceKind, ResourceSpec, Scope,
    Task,
};
use serde::Deserialize;

/// Parameters of `oxide_ssh_key`. Keys belong to the authenticated user.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SshKeyParams {
    #[serde(default)]
    pub oxide_host: Option<String>,
    #[serde(default)]
    pub oxide_token: Option<ApiToken>,
    pub name: String,
    #[serde(default)]
    pub state: DesiredState,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub public_key: Option<String>,
}

impl SshKeyParams {
    pub fn task(&self) -> oxtask_core::Result<Task> {
        validate_name(&self.name)?;

        let desired = match self.state {
            DesiredState::Absent => Desired::Absent,
            DesiredState::Present => {
                let public_key = required(&self.public_key, "public_key")?;
                if public_key.trim().is_empty() {
                    return Err(CoreError::validation_failed(
                        "public_key",
                        "must not be empty",
                        "Paste the contents of the .pub file, e.g. 'ssh-ed25519 AAAA... user@host'",
                    ));
                }
                Desired::Present(ResourceSpec::SshKey(SshKeyCreate {
                    identity: IdentityCreate::new(&self.name, &self.description),
                    public_key: public_key.trim().to_string(),
                }))
            }
        };

        Ok(Task::new(
            ResourceKind::SshKey,
            Scope::CurrentUser,
            &self.name,
            desired,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_public_key_required_when_present() {
        let params: SshKeyParams = serde_json::from_value(json!({ "name": "laptop" })).unwrap();
        let err = params.task().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameter 'public_key' is required when state=present"
        );
    }

    #[test]
    fn test_absent_needs_only_name() {
        let params: SshKeyParams =
            serde_json::from_value(json!({ "name": "laptop", "state": "absent" })).unwrap();
        let task = params.task().unwrap();
        assert_eq!(task.scope, Scope::CurrentUser);
        assert_eq!(task.desired, Desired::Absent);
    }

    #[test]
    fn test_present_payload() {
        let params: SshKeyParams = serde_json::from_value(json!({
            "name": "laptop",
            "public_key": "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5 me@laptop\n"
        }))
        .unwrap();
        match params.task().unwrap().desired {
            Desired::Present(ResourceSpec::SshKey(key)) => {
                assert_eq!(key.public_key, "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5 me@laptop");
            }
            other => panic!("unexpected desired state {:?}", other),
        }
    }
}
