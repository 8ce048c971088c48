//! Task modules: one typed parameter set per module name.
//!
//! Parameters are deserialized with unknown fields rejected, validated into a
//! [`ModuleRequest`], and executed against an [`OxideApi`].

pub mod disk;
pub mod disk_info;
pub mod image;
pub mod instance;
pub mod project;
pub mod snapshot;
pub mod ssh_key;

pub use disk::DiskParams;
pub use disk_info::{DiskInfoParams, DiskQuery};
pub use image::ImageParams;
pub use instance::InstanceParams;
pub use project::ProjectParams;
pub use snapshot::SnapshotParams;
pub use ssh_key::SshKeyParams;

use crate::error::Result;
use crate::locator::Locator;
use crate::reconciler::Reconciler;
use oxtask_client::OxideApi;
use oxtask_core::{validate_name, ApiToken, CoreError, ModuleResult, Scope, Task};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Name under which a module is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleName {
    Disk,
    DiskInfo,
    Image,
    Instance,
    Project,
    Snapshot,
    SshKey,
}

impl ModuleName {
    pub const ALL: [ModuleName; 7] = [
        ModuleName::Disk,
        ModuleName::DiskInfo,
        ModuleName::Image,
        ModuleName::Instance,
        ModuleName::Project,
        ModuleName::Snapshot,
        ModuleName::SshKey,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleName::Disk => "oxide_disk",
            ModuleName::DiskInfo => "oxide_disk_info",
            ModuleName::Image => "oxide_image",
            ModuleName::Instance => "oxide_instance",
            ModuleName::Project => "oxide_project",
            ModuleName::Snapshot => "oxide_snapshot",
            ModuleName::SshKey => "oxide_ssh_key",
        }
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModuleName {
    type Err = CoreError;

    /// Accepts the full module name ("oxide_disk") or the short form ("disk")
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let short = s.strip_prefix("oxide_").unwrap_or(s);
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().strip_prefix("oxide_") == Some(short))
            .ok_or_else(|| CoreError::unknown_module(s))
    }
}

/// Validated parameters of one module invocation
#[derive(Debug, Clone)]
pub enum ModuleParams {
    Disk(DiskParams),
    DiskInfo(DiskInfoParams),
    Image(ImageParams),
    Instance(InstanceParams),
    Project(ProjectParams),
    Snapshot(SnapshotParams),
    SshKey(SshKeyParams),
}

/// What a module asks the API layer to do
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleRequest {
    /// Converge one named resource
    Reconcile(Task),
    /// Read-only disk listing
    DiskInfo(DiskQuery),
}

impl ModuleParams {
    /// Deserialize the parameter mapping for `module`, rejecting unknown keys
    pub fn parse(module: ModuleName, params: serde_json::Value) -> oxtask_core::Result<Self> {
        fn typed<T: serde::de::DeserializeOwned>(
            module: ModuleName,
            params: serde_json::Value,
        ) -> oxtask_core::Result<T> {
            serde_json::from_value(params)
                .map_err(|e| CoreError::invalid_parameters(module.as_str(), e.to_string()))
        }

        Ok(match module {
            ModuleName::Disk => ModuleParams::Disk(typed(module, params)?),
            ModuleName::DiskInfo => ModuleParams::DiskInfo(typed(module, params)?),
            ModuleName::Image => ModuleParams::Image(typed(module, params)?),
            ModuleName::Instance => ModuleParams::Instance(typed(module, params)?),
            ModuleName::Project => ModuleParams::Project(typed(module, params)?),
            ModuleName::Snapshot => ModuleParams::Snapshot(typed(module, params)?),
            ModuleName::SshKey => ModuleParams::SshKey(typed(module, params)?),
        })
    }

    pub fn module(&self) -> ModuleName {
        match self {
            ModuleParams::Disk(_) => ModuleName::Disk,
            ModuleParams::DiskInfo(_) => ModuleName::DiskInfo,
            ModuleParams::Image(_) => ModuleName::Image,
            ModuleParams::Instance(_) => ModuleName::Instance,
            ModuleParams::Project(_) => ModuleName::Project,
            ModuleParams::Snapshot(_) => ModuleName::Snapshot,
            ModuleParams::SshKey(_) => ModuleName::SshKey,
        }
    }

    /// Task-level `oxide_host`, if given
    pub fn oxide_host(&self) -> Option<&str> {
        let host = match self {
            ModuleParams::Disk(p) => &p.oxide_host,
            ModuleParams::DiskInfo(p) => &p.oxide_host,
            ModuleParams::Image(p) => &p.oxide_host,
            ModuleParams::Instance(p) => &p.oxide_host,
            ModuleParams::Project(p) => &p.oxide_host,
            ModuleParams::Snapshot(p) => &p.oxide_host,
            ModuleParams::SshKey(p) => &p.oxide_host,
        };
        host.as_deref()
    }

    /// Task-level `oxide_token`, if given
    pub fn oxide_token(&self) -> Option<&ApiToken> {
        let token = match self {
            ModuleParams::Disk(p) => &p.oxide_token,
            ModuleParams::DiskInfo(p) => &p.oxide_token,
            ModuleParams::Image(p) => &p.oxide_token,
            ModuleParams::Instance(p) => &p.oxide_token,
            ModuleParams::Project(p) => &p.oxide_token,
            ModuleParams::Snapshot(p) => &p.oxide_token,
            ModuleParams::SshKey(p) => &p.oxide_token,
        };
        token.as_ref()
    }

    /// Validate the parameters and build the request they describe
    pub fn request(&self) -> oxtask_core::Result<ModuleRequest> {
        Ok(match self {
            ModuleParams::Disk(p) => ModuleRequest::Reconcile(p.task()?),
            ModuleParams::DiskInfo(p) => ModuleRequest::DiskInfo(p.query()?),
            ModuleParams::Image(p) => ModuleRequest::Reconcile(p.task()?),
            ModuleParams::Instance(p) => ModuleRequest::Reconcile(p.task()?),
            ModuleParams::Project(p) => ModuleRequest::Reconcile(p.task()?),
            ModuleParams::Snapshot(p) => ModuleRequest::Reconcile(p.task()?),
            ModuleParams::SshKey(p) => ModuleRequest::Reconcile(p.task()?),
        })
    }
}

/// Run a validated request and render its module result
pub async fn execute(
    api: Arc<dyn OxideApi>,
    request: ModuleRequest,
    check_mode: bool,
) -> Result<ModuleResult> {
    match request {
        ModuleRequest::Reconcile(task) => {
            info!(
                kind = %task.kind,
                name = %task.name,
                state = %task.desired.state(),
                check_mode,
                "Reconciling"
            );
            let outcome = Reconciler::new(api, check_mode).run(&task).await?;
            Ok(ModuleResult::from_outcome(task.kind, outcome))
        }
        ModuleRequest::DiskInfo(query) => {
            let records = disk_info::gather(&Locator::new(api), &query).await?;
            Ok(ModuleResult::listing(records))
        }
    }
}

/// Require a parameter that only matters for `state=present`
pub(crate) fn required<T: Clone>(value: &Option<T>, parameter: &str) -> oxtask_core::Result<T> {
    value
        .clone()
        .ok_or_else(|| CoreError::missing_parameter(parameter, "state=present"))
}

/// Scope for a project-scoped kind. The project may be given by name or id.
pub(crate) fn project_scope(project: &Option<String>, kind_plural: &str) -> oxtask_core::Result<Scope> {
    let project = project.as_deref().ok_or_else(|| {
        CoreError::missing_parameter("project", format!("managing {}", kind_plural))
    })?;
    if uuid::Uuid::parse_str(project).is_err() {
        validate_name(project)?;
    }
    Ok(Scope::Project(project.to_string()))
}
