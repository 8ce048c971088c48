use crate::error::Result;
use crate::locator::{decode_record, Locator};
use oxtask_client::{Method, OxideApi};
use oxtask_core::resources::quantities::format_bytes;
use oxtask_core::resources::{IdentityUpdate, ResourceSpec};
use oxtask_core::{
    CoreError, Desired, PlannedAction, ReconciliationOutcome, ResourceRecord, Task,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives one named resource toward its desired state
///
/// The reconciler locates the current resource, compares it with the task,
/// and issues at most one write (create, update or delete). In check mode
/// the same reads and decision happen but the write is only reported.
pub struct Reconciler {
    api: Arc<dyn OxideApi>,
    locator: Locator,
    check_mode: bool,
}

impl Reconciler {
    pub fn new(api: Arc<dyn OxideApi>, check_mode: bool) -> Self {
        let locator = Locator::new(api.clone());
        Self {
            api,
            locator,
            check_mode,
        }
    }

    /// Locate the task's target and converge it
    pub async fn run(&self, task: &Task) -> Result<ReconciliationOutcome> {
        let existing = self
            .locator
            .find(task.kind, &task.scope, &task.name)
            .await?;
        self.reconcile(task, existing).await
    }

    /// Decide and apply the action for a task given what currently exists
    pub async fn reconcile(
        &self,
        task: &Task,
        existing: Option<ResourceRecord>,
    ) -> Result<ReconciliationOutcome> {
        match (&task.desired, existing) {
            (Desired::Present(spec), None) => {
                if self.check_mode {
                    info!("Would create {} '{}' in {}", task.kind, task.name, task.scope);
                    return Ok(ReconciliationOutcome::Planned(PlannedAction::Create));
                }
                let record = self.create(task, spec).await?;
                Ok(ReconciliationOutcome::Created(record))
            }
            (Desired::Present(spec), Some(record)) => self.converge(task, spec, record).await,
            (Desired::Absent, None) => {
                debug!("{} '{}' is already absent", task.kind, task.name);
                Ok(ReconciliationOutcome::Unchanged {
                    record: None,
                    warnings: Vec::new(),
                })
            }
            (Desired::Absent, Some(record)) => {
                if self.check_mode {
                    info!("Would delete {} '{}' ({})", task.kind, task.name, record.id);
                    return Ok(ReconciliationOutcome::Planned(PlannedAction::Delete));
                }
                self.delete(task, &record).await?;
                Ok(ReconciliationOutcome::Deleted(record.id))
            }
        }
    }

    /// Compare mutable fields of an existing resource with the spec
    async fn converge(
        &self,
        task: &Task,
        spec: &ResourceSpec,
        record: ResourceRecord,
    ) -> Result<ReconciliationOutcome> {
        if record.description == spec.description() {
            debug!("{} '{}' is up to date", task.kind, task.name);
            return Ok(ReconciliationOutcome::Unchanged {
                record: Some(record),
                warnings: Vec::new(),
            });
        }

        if !task.kind.supports_update() {
            let warning = format!(
                "{} '{}' has description '{}' but '{}' was requested; existing {}s are not updated",
                task.kind.label(),
                task.name,
                record.description,
                spec.description(),
                task.kind
            );
            warn!("{}", warning);
            return Ok(ReconciliationOutcome::Unchanged {
                record: Some(record),
                warnings: vec![warning],
            });
        }

        if self.check_mode {
            info!("Would update {} '{}' ({})", task.kind, task.name, record.id);
            return Ok(ReconciliationOutcome::Planned(PlannedAction::Update));
        }

        let body = serde_json::to_value(IdentityUpdate {
            description: spec.description().to_string(),
        })
        .map_err(|e| {
            CoreError::serialization_error(
                format!("Failed to serialize {} update request: {}", task.kind, e),
                Some(Box::new(e)),
            )
        })?;
        let updated = self
            .api
            .call(
                Method::PUT,
                &task.kind.item_path(&record.id.to_string()),
                &[],
                Some(&body),
            )
            .await?;
        let updated = decode_record(task.kind, updated)?;
        info!(
            kind = %task.kind,
            id = %updated.id,
            "Updated {} '{}'", task.kind, task.name
        );
        Ok(ReconciliationOutcome::Updated(updated))
    }

    async fn create(&self, task: &Task, spec: &ResourceSpec) -> Result<ResourceRecord> {
        match spec {
            ResourceSpec::Disk(disk) => info!(
                "Creating disk '{}' ({}) in {}",
                task.name,
                format_bytes(disk.size),
                task.scope
            ),
            ResourceSpec::Instance(instance) => info!(
                "Creating instance '{}' ({} vCPU, {}) in {}",
                task.name,
                instance.ncpus,
                format_bytes(instance.memory),
                task.scope
            ),
            _ => info!("Creating {} '{}' in {}", task.kind, task.name, task.scope),
        }

        let body = spec.to_body()?;
        let created = self
            .api
            .call(
                Method::POST,
                &task.kind.collection_path(),
                &task.scope.query(),
                Some(&body),
            )
            .await?;
        let record = decode_record(task.kind, created)?;
        info!(kind = %task.kind, id = %record.id, "Created {} '{}'", task.kind, record.name);
        Ok(record)
    }

    async fn delete(&self, task: &Task, record: &ResourceRecord) -> Result<()> {
        info!("Deleting {} '{}' ({})", task.kind, task.name, record.id);
        self.api
            .call(
                Method::DELETE,
                &task.kind.item_path(&record.id.to_string()),
                &[],
                None,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconcileError;
    use oxtask_client::{ApiError, MockApi};
    use oxtask_core::resources::{
        BlockSize, DiskCreate, DiskSource, IdentityCreate, ProjectCreate,
    };
    use oxtask_core::resources::quantities::GIB;
    use oxtask_core::{ResourceKind, Scope};
    use serde_json::json;
    use uuid::Uuid;

    const IMAGE_ID: &str = "5c2bfb2c-8e4d-4a3b-9b6f-2f1e3d4c5b6a";

    fn bakery() -> Scope {
        Scope::Project("bakery".to_string())
    }

    fn croissant_task(description: &str) -> Task {
        Task::new(
            ResourceKind::Disk,
            bakery(),
            "croissant",
            Desired::Present(ResourceSpec::Disk(DiskCreate {
                identity: IdentityCreate::new("croissant", description),
                disk_source: DiskSource::Image {
                    image_id: Uuid::parse_str(IMAGE_ID).unwrap(),
                },
                size: 10 * GIB,
            })),
        )
    }

    fn project_task(description: &str) -> Task {
        Task::new(
            ResourceKind::Project,
            Scope::Silo,
            "prod",
            Desired::Present(ResourceSpec::Project(ProjectCreate {
                identity: IdentityCreate::new("prod", description),
            })),
        )
    }

    async fn bakery_api() -> Arc<MockApi> {
        let api = Arc::new(MockApi::new());
        api.add_project("bakery").await;
        api.seed(
            ResourceKind::Image,
            &bakery(),
            "debian",
            json!({ "id": IMAGE_ID, "os": "debian", "version": "12" }),
        )
        .await;
        api
    }

    #[tokio::test]
    async fn test_croissant_create_then_noop() {
        let api = bakery_api().await;
        let reconciler = Reconciler::new(api.clone(), false);
        let task = croissant_task("");

        let first = reconciler.run(&task).await.unwrap();
        let record = match &first {
            ReconciliationOutcome::Created(record) => record.clone(),
            other => panic!("expected Created, got {:?}", other),
        };
        assert!(first.changed());
        assert_eq!(record.name, "croissant");
        assert_eq!(record.attribute("size"), Some(&json!(10 * GIB)));
        assert_eq!(record.attribute("image_id"), Some(&json!(IMAGE_ID)));
        assert_eq!(api.write_calls().await, 1);

        let second = reconciler.run(&task).await.unwrap();
        assert!(!second.changed());
        assert_eq!(api.write_calls().await, 1);
    }

    #[tokio::test]
    async fn test_create_sends_scope_and_payload() {
        let api = bakery_api().await;
        let reconciler = Reconciler::new(api.clone(), false);
        reconciler.run(&croissant_task("flaky")).await.unwrap();

        let calls = api.calls().await;
        let post = calls.iter().find(|c| c.is_write()).unwrap();
        assert_eq!(post.method, Method::POST);
        assert_eq!(post.path, "/v1/disks");
        assert_eq!(post.query_param("project"), Some("bakery"));
        assert_eq!(
            post.body,
            Some(json!({
                "name": "croissant",
                "description": "flaky",
                "disk_source": { "type": "image", "image_id": IMAGE_ID },
                "size": 10 * GIB
            }))
        );
    }

    #[tokio::test]
    async fn test_absent_deletes_by_id() {
        let api = bakery_api().await;
        let existing = api
            .seed(ResourceKind::Disk, &bakery(), "croissant", json!({}))
            .await;
        let reconciler = Reconciler::new(api.clone(), false);
        let task = Task::new(ResourceKind::Disk, bakery(), "croissant", Desired::Absent);

        let outcome = reconciler.run(&task).await.unwrap();
        assert_eq!(outcome, ReconciliationOutcome::Deleted(existing.id));

        let calls = api.calls().await;
        let delete = calls.iter().find(|c| c.is_write()).unwrap();
        assert_eq!(delete.method, Method::DELETE);
        assert_eq!(delete.path, format!("/v1/disks/{}", existing.id));
        assert!(delete.query.is_empty());
        assert!(api.records(ResourceKind::Disk).await.is_empty());
    }

    #[tokio::test]
    async fn test_absent_when_missing_is_noop() {
        let api = bakery_api().await;
        let reconciler = Reconciler::new(api.clone(), false);
        let task = Task::new(ResourceKind::Disk, bakery(), "croissant", Desired::Absent);

        let outcome = reconciler.run(&task).await.unwrap();
        assert_eq!(
            outcome,
            ReconciliationOutcome::Unchanged {
                record: None,
                warnings: vec![]
            }
        );
        assert_eq!(api.write_calls().await, 0);
    }

    #[tokio::test]
    async fn test_duplicates_block_writes() {
        let api = bakery_api().await;
        api.seed(ResourceKind::Disk, &bakery(), "croissant", json!({}))
            .await;
        api.seed(ResourceKind::Disk, &bakery(), "croissant", json!({}))
            .await;
        let reconciler = Reconciler::new(api.clone(), false);

        let err = reconciler
            .run(&Task::new(
                ResourceKind::Disk,
                bakery(),
                "croissant",
                Desired::Absent,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::DuplicateResource { .. }));
        assert_eq!(api.write_calls().await, 0);
    }

    #[tokio::test]
    async fn test_check_mode_never_writes() {
        let api = bakery_api().await;
        let reconciler = Reconciler::new(api.clone(), true);

        let outcome = reconciler.run(&croissant_task("")).await.unwrap();
        assert_eq!(outcome, ReconciliationOutcome::Planned(PlannedAction::Create));
        assert!(outcome.changed());

        api.add_project("prod").await;
        let outcome = reconciler.run(&project_task("changed")).await.unwrap();
        assert_eq!(outcome, ReconciliationOutcome::Planned(PlannedAction::Update));

        let outcome = reconciler
            .run(&Task::new(
                ResourceKind::Project,
                Scope::Silo,
                "prod",
                Desired::Absent,
            ))
            .await
            .unwrap();
        assert_eq!(outcome, ReconciliationOutcome::Planned(PlannedAction::Delete));

        assert_eq!(api.write_calls().await, 0);
    }

    #[tokio::test]
    async fn test_project_description_drift_is_updated() {
        let api = Arc::new(MockApi::new());
        let existing = api
            .seed(
                ResourceKind::Project,
                &Scope::Silo,
                "prod",
                json!({ "description": "old" }),
            )
            .await;
        let reconciler = Reconciler::new(api.clone(), false);

        let outcome = reconciler.run(&project_task("new")).await.unwrap();
        let record = match outcome {
            ReconciliationOutcome::Updated(record) => record,
            other => panic!("expected Updated, got {:?}", other),
        };
        assert_eq!(record.description, "new");

        let calls = api.calls().await;
        let writes: Vec<_> = calls.iter().filter(|c| c.is_write()).collect();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].method, Method::PUT);
        assert_eq!(writes[0].path, format!("/v1/projects/{}", existing.id));
        assert_eq!(writes[0].body, Some(json!({ "description": "new" })));
    }

    #[tokio::test]
    async fn test_disk_description_drift_warns() {
        let api = bakery_api().await;
        api.seed(
            ResourceKind::Disk,
            &bakery(),
            "croissant",
            json!({ "description": "old", "size": 10 * GIB }),
        )
        .await;
        let reconciler = Reconciler::new(api.clone(), false);

        let outcome = reconciler.run(&croissant_task("new")).await.unwrap();
        match outcome {
            ReconciliationOutcome::Unchanged {
                record: Some(record),
                warnings,
            } => {
                assert_eq!(record.description, "old");
                assert_eq!(warnings.len(), 1);
                assert!(warnings[0].contains("Disk 'croissant'"));
            }
            other => panic!("expected Unchanged with warning, got {:?}", other),
        }
        assert_eq!(api.write_calls().await, 0);
    }

    #[tokio::test]
    async fn test_create_race_surfaces_conflict() {
        let api = bakery_api().await;
        api.inject_error(
            Method::POST,
            "/v1/disks",
            400,
            "ObjectAlreadyExists",
            "already exists: disk \"croissant\"",
        )
        .await;
        let reconciler = Reconciler::new(api.clone(), false);

        let err = reconciler.run(&croissant_task("")).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Api(ApiError::Conflict { .. })));
        assert_eq!(err.response_body().unwrap()["error_code"], "ObjectAlreadyExists");
    }

    #[tokio::test]
    async fn test_unknown_image_error_is_surfaced() {
        let api = Arc::new(MockApi::new());
        api.add_project("bakery").await;
        let reconciler = Reconciler::new(api.clone(), false);

        let err = reconciler.run(&croissant_task("")).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Api(ApiError::NotFound { .. })));
        assert!(api.records(ResourceKind::Disk).await.is_empty());
    }

    #[tokio::test]
    async fn test_blank_disk_block_size_is_sent() {
        let api = bakery_api().await;
        let reconciler = Reconciler::new(api.clone(), false);
        let task = Task::new(
            ResourceKind::Disk,
            bakery(),
            "scratch",
            Desired::Present(ResourceSpec::Disk(DiskCreate {
                identity: IdentityCreate::new("scratch", ""),
                disk_source: DiskSource::Blank {
                    block_size: BlockSize::try_from(4096).unwrap(),
                },
                size: GIB,
            })),
        );

        let outcome = reconciler.run(&task).await.unwrap();
        match outcome {
            ReconciliationOutcome::Created(record) => {
                assert_eq!(record.attribute("block_size"), Some(&json!(4096)));
            }
            other => panic!("expected Created, got {:?}", other),
        }
    }
}
