use crate::error::Result;
use crate::locator::Locator;
use oxtask_core::{validate_name, ApiToken, CoreError, ResourceKind, ResourceRecord, Scope};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

/// Parameters of `oxide_disk_info`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiskInfoParams {
    #[serde(default)]
    pub oxide_host: Option<String>,
    #[serde(default)]
    pub oxide_token: Option<ApiToken>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub disk_ids: Option<Vec<Uuid>>,
}

/// Which disks to report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskQuery {
    ByIds(Vec<Uuid>),
    InProject(Scope),
}

impl DiskInfoParams {
    pub fn query(&self) -> oxtask_core::Result<DiskQuery> {
        if let Some(ids) = &self.disk_ids {
            if !ids.is_empty() {
                return Ok(DiskQuery::ByIds(ids.clone()));
            }
        }

        let project = self.project.as_deref().ok_or_else(|| {
            CoreError::missing_parameter("project", "disk_ids is not given")
        })?;
        if Uuid::parse_str(project).is_err() {
            validate_name(project)?;
        }
        Ok(DiskQuery::InProject(Scope::Project(project.to_string())))
    }
}

/// Fetch the disks a query selects
pub async fn gather(locator: &Locator, query: &DiskQuery) -> Result<Vec<ResourceRecord>> {
    match query {
        DiskQuery::ByIds(ids) => {
            let mut records = Vec::with_capacity(ids.len());
            for id in ids {
                debug!(%id, "Fetching disk");
                records.push(locator.get(ResourceKind::Disk, *id).await?);
            }
            Ok(records)
        }
        DiskQuery::InProject(scope) => locator.list(ResourceKind::Disk, scope).await,
    }
}
