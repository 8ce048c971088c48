use super::{project_scope, required};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use oxtask_core::resources::quantities::{gib_to_bytes, MAX_USER_DATA_BYTES};
use oxtask_core::resources::{
    DiskCreate, DiskSource, IdentityCreate, InstanceCreate, InstanceDiskAttachment,
};
use oxtask_core::{
    validate_name, ApiToken, CoreError, Desired, DesiredState, ResourceKind, ResourceSpec, Task,
};
use serde::Deserialize;

fn default_start() -> bool {
    true
}

/// Parameters of `oxide_instance`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceParams {
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
    pub hostname: Option<String>,
    /// Memory in GiB
    #[serde(default)]
    pub memory: Option<u64>,
    #[serde(default)]
    pub ncpus: Option<u16>,
    #[serde(default)]
    pub disks: InstanceDisksParams,
    #[serde(default)]
    pub ssh_public_keys: Option<Vec<String>>,
    #[serde(default = "default_start")]
    pub start_on_create: bool,
    /// Base64-encoded cloud-init user data
    #[serde(default)]
    pub user_data: Option<String>,
}

/// Disks to create with the instance and existing disks to attach
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceDisksParams {
    #[serde(default)]
    pub create: Vec<NewDiskParams>,
    /// Names of existing disks in the same project
    #[serde(default)]
    pub attach: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewDiskParams {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Size in GiB
    pub size: u64,
    pub disk_source: DiskSource,
}

impl InstanceParams {
    pub fn task(&self) -> oxtask_core::Result<Task> {
        validate_name(&self.name)?;
        let scope = project_scope(&self.project, "instances")?;

        let desired = match self.state {
            DesiredState::Absent => Desired::Absent,
            DesiredState::Present => Desired::Present(ResourceSpec::Instance(self.create()?)),
        };

        Ok(Task::new(ResourceKind::Instance, scope, &self.name, desired))
    }

    fn create(&self) -> oxtask_core::Result<InstanceCreate> {
        let hostname = required(&self.hostname, "hostname")?;
        if hostname.trim().is_empty() {
            return Err(CoreError::validation_failed(
                "hostname",
                "must not be empty",
                "Set 'hostname' to the guest hostname, e.g. the instance name",
            ));
        }

        let memory = gib_to_bytes("memory", required(&self.memory, "memory")?)?;
        let ncpus = required(&self.ncpus, "ncpus")?;
        if ncpus == 0 {
            return Err(CoreError::validation_failed(
                "ncpus",
                "must be a positive integer",
                "Set 'ncpus' to the number of vCPUs, e.g. 2",
            ));
        }

        let mut disks = Vec::with_capacity(self.disks.create.len() + self.disks.attach.len());
        for disk in &self.disks.create {
            validate_name(&disk.name)?;
            disks.push(InstanceDiskAttachment::Create(DiskCreate {
                identity: IdentityCreate::new(&disk.name, &disk.description),
                disk_source: disk.disk_source.clone(),
                size: gib_to_bytes("disks.create.size", disk.size)?,
            }));
        }
        for name in &self.disks.attach {
            validate_name(name)?;
            disks.push(InstanceDiskAttachment::Attach { name: name.clone() });
        }

        let user_data = match &self.user_data {
            Some(user_data) => Some(validate_user_data(user_data)?),
            None => None,
        };

        Ok(InstanceCreate {
            identity: IdentityCreate::new(&self.name, &self.description),
            hostname,
            memory,
            ncpus,
            disks,
            ssh_public_keys: self.ssh_public_keys.clone(),
            start: self.start_on_create,
            user_data,
        })
    }
}

/// `user_data` must be valid base64 and decode to at most 32 KiB
///
/// Returns the value that is sent: surrounding whitespace, such as the
/// trailing newline of a YAML block scalar, is stripped so the API decodes
/// exactly what was checked here.
fn validate_user_data(user_data: &str) -> oxtask_core::Result<String> {
    let user_data = user_data.trim();
    let decoded = STANDARD.decode(user_data).map_err(|e| {
        CoreError::validation_failed(
            "user_data",
            format!("is not valid base64: {}", e),
            "Encode the cloud-init document first, e.g. with the b64encode filter",
        )
    })?;

    if decoded.len() > MAX_USER_DATA_BYTES {
        return Err(CoreError::validation_failed(
            "user_data",
            format!(
                "decodes to {} bytes, more than the {} byte limit",
                decoded.len(),
                MAX_USER_DATA_BYTES
            ),
            "Shrink the cloud-init document or fetch large content from within the guest",
        ));
    }
    Ok(user_data.to_string())
}
