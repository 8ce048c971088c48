use crate::error::{ApiError, Result};
use crate::traits::OxideApi;
use async_trait::async_trait;
use chrono::Utc;
use oxtask_core::{ResourceKind, ResourceRecord, Scope};
use reqwest::{Method, StatusCode};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Page size used when a list call carries no `limit`
const DEFAULT_LIMIT: usize = 100;

/// A request as seen by `MockApi`
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl MockCall {
    /// Whether this call would modify remote state
    pub fn is_write(&self) -> bool {
        self.method != Method::GET
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
struct MockObject {
    kind: ResourceKind,
    /// Name of the owning project for project-scoped kinds
    project: Option<String>,
    record: ResourceRecord,
}

#[derive(Debug, Clone)]
struct InjectedError {
    method: Method,
    path: String,
    status: StatusCode,
    error_code: String,
    message: String,
}

#[derive(Debug, Default)]
struct MockState {
    objects: Vec<MockObject>,
    calls: Vec<MockCall>,
    injected: Vec<InjectedError>,
}

/// In-memory Oxide API for tests
///
/// Serves the `/v1` collections the modules use with the same paths, query
/// parameters, pagination and error bodies as the real API. Every call is
/// recorded so tests can assert on exactly which requests were issued.
pub struct MockApi {
    state: Arc<RwLock<MockState>>,
    page_size: Option<usize>,
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState::default())),
            page_size: None,
        }
    }

    /// Cap every list page at `size` items, whatever `limit` the caller asks for
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size.max(1));
        self
    }

    /// Insert a record directly, bypassing name-uniqueness checks
    ///
    /// `attributes` may carry an `id`, a `description` and any kind-specific fields.
    pub async fn seed(
        &self,
        kind: ResourceKind,
        scope: &Scope,
        name: &str,
        attributes: Value,
    ) -> ResourceRecord {
        let mut attributes = match attributes {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let description = match attributes.remove("description") {
            Some(Value::String(d)) => d,
            _ => String::new(),
        };
        let id = attributes
            .remove("id")
            .and_then(|id| id.as_str().and_then(|s| Uuid::parse_str(s).ok()))
            .unwrap_or_else(Uuid::new_v4);

        let now = Utc::now();
        let record = ResourceRecord {
            id,
            name: name.to_string(),
            description,
            time_created: Some(now),
            time_modified: Some(now),
            attributes,
        };

        let project = match scope {
            Scope::Project(p) => Some(p.clone()),
            Scope::Silo | Scope::CurrentUser => None,
        };

        self.state.write().await.objects.push(MockObject {
            kind,
            project,
            record: record.clone(),
        });
        record
    }

    /// Seed an empty project
    pub async fn add_project(&self, name: &str) -> ResourceRecord {
        self.seed(ResourceKind::Project, &Scope::Silo, name, json!({}))
            .await
    }

    /// Make the next `method` request to `path` fail with `status`
    pub async fn inject_error(
        &self,
        method: Method,
        path: &str,
        status: u16,
        error_code: &str,
        message: &str,
    ) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.state.write().await.injected.push(InjectedError {
            method,
            path: path.to_string(),
            status,
            error_code: error_code.to_string(),
            message: message.to_string(),
        });
    }

    pub async fn calls(&self) -> Vec<MockCall> {
        self.state.read().await.calls.clone()
    }

    /// Number of non-GET requests received so far
    pub async fn write_calls(&self) -> usize {
        self.state
            .read()
            .await
            .calls
            .iter()
            .filter(|c| c.is_write())
            .count()
    }

    /// Current records of one kind, in insertion order
    pub async fn records(&self, kind: ResourceKind) -> Vec<ResourceRecord> {
        self.state
            .read()
            .await
            .objects
            .iter()
            .filter(|o| o.kind == kind)
            .map(|o| o.record.clone())
            .collect()
    }
}

#[async_trait]
impl OxideApi for MockApi {
    async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let mut state = self.state.write().await;
        let call = MockCall {
            method: method.clone(),
            path: path.to_string(),
            query: query.to_vec(),
            body: body.cloned(),
        };
        state.calls.push(call.clone());
        debug!("Mock: {} {}", method, path);

        if let Some(pos) = state
            .injected
            .iter()
            .position(|e| e.method == method && e.path == path)
        {
            let injected = state.injected.remove(pos);
            return Err(api_error(
                injected.status,
                &injected.error_code,
                injected.message,
            ));
        }

        let (kind, item) = route(path).ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                "ObjectNotFound",
                format!("no route for {}", path),
            )
        })?;

        match item {
            None if method == Method::GET => state.list(kind, &call, self.page_size),
            None if method == Method::POST => state.create(kind, &call),
            Some(item) if method == Method::GET => {
                let project = state.project_param(&call)?;
                let index = state.find(kind, item, project.as_deref())?;
                Ok(to_value(&state.objects[index].record))
            }
            Some(item) if method == Method::PUT => state.update(kind, item, &call),
            Some(item) if method == Method::DELETE => state.delete(kind, item, &call),
            _ => Err(api_error(
                StatusCode::METHOD_NOT_ALLOWED,
                "MethodNotAllowed",
                format!("{} is not supported on {}", method, path),
            )),
        }
    }
}

impl MockState {
    /// Resolve the `project` query parameter to a project name
    fn project_param(&self, call: &MockCall) -> Result<Option<String>> {
        let Some(selector) = call.query_param("project") else {
            return Ok(None);
        };

        self.objects
            .iter()
            .find(|o| {
                o.kind == ResourceKind::Project
                    && (o.record.name == selector || o.record.id.to_string() == selector)
            })
            .map(|o| Some(o.record.name.clone()))
            .ok_or_else(|| {
                api_error(
                    StatusCode::NOT_FOUND,
                    "ObjectNotFound",
                    format!("not found: project with name \"{}\"", selector),
                )
            })
    }

    fn project_id(&self, project: Option<&str>) -> Option<Uuid> {
        let project = project?;
        self.objects
            .iter()
            .find(|o| o.kind == ResourceKind::Project && o.record.name == project)
            .map(|o| o.record.id)
    }

    fn find(&self, kind: ResourceKind, item: &str, project: Option<&str>) -> Result<usize> {
        let by_id = Uuid::parse_str(item).ok();
        if by_id.is_none() && requires_project(kind) && project.is_none() {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                format!("project must be specified to look up {} by name", kind),
            ));
        }

        self.objects
            .iter()
            .position(|o| {
                o.kind == kind
                    && match by_id {
                        Some(id) => o.record.id == id,
                        None => o.record.name == item && o.project.as_deref() == project,
                    }
            })
            .ok_or_else(|| not_found(kind, item))
    }

    fn find_by_id(&self, kind: ResourceKind, id: &Value) -> Result<ResourceRecord> {
        let id = id.as_str().unwrap_or_default();
        self.find(kind, id, None)
            .map(|i| self.objects[i].record.clone())
    }

    fn list(&self, kind: ResourceKind, call: &MockCall, page_size: Option<usize>) -> Result<Value> {
        let project = self.project_param(call)?;
        if requires_project(kind) && project.is_none() {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                format!("project must be specified to list {}s", kind),
            ));
        }

        let mut limit = call
            .query_param("limit")
            .and_then(|l| l.parse::<usize>().ok())
            .unwrap_or(DEFAULT_LIMIT)
            .max(1);
        if let Some(size) = page_size {
            limit = limit.min(size);
        }
        let offset = match call.query_param("page_token") {
            Some(token) => token.parse::<usize>().map_err(|_| {
                api_error(
                    StatusCode::BAD_REQUEST,
                    "InvalidValue",
                    format!("unable to parse page token \"{}\"", token),
                )
            })?,
            None => 0,
        };

        let matching: Vec<&ResourceRecord> = self
            .objects
            .iter()
            .filter(|o| o.kind == kind && o.project == project)
            .map(|o| &o.record)
            .collect();

        let items: Vec<Value> = matching
            .iter()
            .skip(offset)
            .take(limit)
            .map(|r| to_value(r))
            .collect();
        let next_page = (offset + limit < matching.len()).then(|| (offset + limit).to_string());

        Ok(json!({ "items": items, "next_page": next_page }))
    }

    fn create(&mut self, kind: ResourceKind, call: &MockCall) -> Result<Value> {
        let project = self.project_param(call)?;
        if requires_project(kind) && project.is_none() {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                format!("project must be specified to create a {}", kind),
            ));
        }

        let mut body = match &call.body {
            Some(Value::Object(map)) => map.clone(),
            _ => {
                return Err(api_error(
                    StatusCode::BAD_REQUEST,
                    "InvalidRequest",
                    "request body must be a JSON object".to_string(),
                ))
            }
        };
        let name = match body.remove("name") {
            Some(Value::String(name)) => name,
            _ => {
                return Err(api_error(
                    StatusCode::BAD_REQUEST,
                    "InvalidRequest",
                    "missing field `name`".to_string(),
                ))
            }
        };
        let description = match body.remove("description") {
            Some(Value::String(d)) => d,
            _ => String::new(),
        };

        if self.name_taken(kind, &name, project.as_deref()) {
            return Err(already_exists(kind, &name));
        }

        let mut attributes = self.create_attributes(kind, body, project.as_deref())?;
        if let Some(project_id) = self.project_id(project.as_deref()) {
            attributes.insert("project_id".to_string(), json!(project_id));
        }

        let now = Utc::now();
        let record = ResourceRecord {
            id: Uuid::new_v4(),
            name,
            description,
            time_created: Some(now),
            time_modified: Some(now),
            attributes,
        };
        self.objects.push(MockObject {
            kind,
            project,
            record: record.clone(),
        });

        Ok(to_value(&record))
    }

    fn name_taken(&self, kind: ResourceKind, name: &str, project: Option<&str>) -> bool {
        self.objects
            .iter()
            .any(|o| o.kind == kind && o.record.name == name && o.project.as_deref() == project)
    }

    /// Turn a create body into the attributes the API would report back
    fn create_attributes(
        &mut self,
        kind: ResourceKind,
        mut body: Map<String, Value>,
        project: Option<&str>,
    ) -> Result<Map<String, Value>> {
        match kind {
            ResourceKind::Disk => {
                let source = body.remove("disk_source").unwrap_or(Value::Null);
                let block_size = source.get("block_size").cloned().unwrap_or(json!(512));
                body.insert("block_size".to_string(), block_size);
                body.insert("state".to_string(), json!({ "state": "detached" }));
                match source.get("type").and_then(Value::as_str) {
                    Some("snapshot") => {
                        let snapshot = self.find_by_id(
                            ResourceKind::Snapshot,
                            source.get("snapshot_id").unwrap_or(&Value::Null),
                        )?;
                        body.insert("snapshot_id".to_string(), json!(snapshot.id));
                    }
                    Some("image") => {
                        let image = self.find_by_id(
                            ResourceKind::Image,
                            source.get("image_id").unwrap_or(&Value::Null),
                        )?;
                        body.insert("image_id".to_string(), json!(image.id));
                    }
                    _ => {}
                }
            }
            ResourceKind::Snapshot => {
                let disk = body
                    .remove("disk")
                    .and_then(|d| d.as_str().map(str::to_string))
                    .unwrap_or_default();
                let index = self.find(ResourceKind::Disk, &disk, project)?;
                let record = &self.objects[index].record;
                body.insert("disk_id".to_string(), json!(record.id));
                if let Some(size) = record.attribute("size") {
                    body.insert("size".to_string(), size.clone());
                }
                body.insert("state".to_string(), json!("ready"));
            }
            ResourceKind::Image => {
                let source = body.remove("source").unwrap_or(Value::Null);
                let snapshot = self.find_by_id(
                    ResourceKind::Snapshot,
                    source.get("id").unwrap_or(&Value::Null),
                )?;
                if let Some(size) = snapshot.attribute("size") {
                    body.insert("size".to_string(), size.clone());
                }
                body.insert("block_size".to_string(), json!(512));
            }
            ResourceKind::Instance => {
                let start = body
                    .remove("start")
                    .and_then(|s| s.as_bool())
                    .unwrap_or(true);
                body.remove("user_data");
                body.remove("ssh_public_keys");
                let disks = body.remove("disks").unwrap_or(Value::Null);
                self.attach_instance_disks(&disks, project)?;
                let run_state = if start { "running" } else { "stopped" };
                body.insert("run_state".to_string(), json!(run_state));
                body.insert("time_run_state_updated".to_string(), json!(Utc::now()));
            }
            ResourceKind::Project | ResourceKind::SshKey => {}
        }
        Ok(body)
    }

    /// Create or verify the disks named in an instance create request
    fn attach_instance_disks(&mut self, disks: &Value, project: Option<&str>) -> Result<()> {
        let Some(disks) = disks.as_array() else {
            return Ok(());
        };

        for disk in disks {
            match disk.get("type").and_then(Value::as_str) {
                Some("attach") => {
                    let name = disk.get("name").and_then(Value::as_str).unwrap_or_default();
                    self.find(ResourceKind::Disk, name, project)?;
                }
                Some("create") => {
                    let mut body = match disk {
                        Value::Object(map) => map.clone(),
                        _ => continue,
                    };
                    body.remove("type");
                    let call = MockCall {
                        method: Method::POST,
                        path: ResourceKind::Disk.collection_path(),
                        query: project
                            .map(|p| vec![("project".to_string(), p.to_string())])
                            .unwrap_or_default(),
                        body: Some(Value::Object(body)),
                    };
                    self.create(ResourceKind::Disk, &call)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn update(&mut self, kind: ResourceKind, item: &str, call: &MockCall) -> Result<Value> {
        if !kind.supports_update() {
            return Err(api_error(
                StatusCode::METHOD_NOT_ALLOWED,
                "MethodNotAllowed",
                format!("{}s cannot be updated", kind),
            ));
        }

        let project = self.project_param(call)?;
        let index = self.find(kind, item, project.as_deref())?;
        let record = &mut self.objects[index].record;
        if let Some(Value::String(description)) = call.body.as_ref().and_then(|b| b.get("description")) {
            record.description = description.clone();
        }
        record.time_modified = Some(Utc::now());

        Ok(to_value(record))
    }

    fn delete(&mut self, kind: ResourceKind, item: &str, call: &MockCall) -> Result<Value> {
        let project = self.project_param(call)?;
        let index = self.find(kind, item, project.as_deref())?;

        if kind == ResourceKind::Project {
            let name = self.objects[index].record.name.clone();
            if let Some(child) = self
                .objects
                .iter()
                .find(|o| o.project.as_deref() == Some(name.as_str()))
            {
                return Err(api_error(
                    StatusCode::BAD_REQUEST,
                    "InvalidRequest",
                    format!("project to be deleted contains a {}: {}", child.kind, child.record.name),
                ));
            }
        }

        self.objects.remove(index);
        Ok(Value::Null)
    }
}

/// Match a request path to a collection and optional item selector
fn route(path: &str) -> Option<(ResourceKind, Option<&str>)> {
    let rest = path.strip_prefix("/v1/")?;
    ResourceKind::ALL.iter().find_map(|kind| {
        let collection = kind.collection();
        if rest == collection {
            return Some((*kind, None));
        }
        rest.strip_prefix(collection)
            .and_then(|r| r.strip_prefix('/'))
            .filter(|item| !item.is_empty() && !item.contains('/'))
            .map(|item| (*kind, Some(item)))
    })
}

/// Kinds that cannot be listed or looked up by name without a project
fn requires_project(kind: ResourceKind) -> bool {
    matches!(
        kind,
        ResourceKind::Disk | ResourceKind::Instance | ResourceKind::Snapshot
    )
}

fn to_value(record: &ResourceRecord) -> Value {
    serde_json::to_value(record).unwrap_or(Value::Null)
}

fn api_error(status: StatusCode, error_code: &str, message: String) -> ApiError {
    let body = json!({
        "request_id": Uuid::new_v4().to_string(),
        "error_code": error_code,
        "message": message,
    });
    ApiError::from_status(status, &body.to_string())
}

fn not_found(kind: ResourceKind, item: &str) -> ApiError {
    let selector = if Uuid::parse_str(item).is_ok() {
        "id"
    } else {
        "name"
    };
    api_error(
        StatusCode::NOT_FOUND,
        "ObjectNotFound",
        format!("not found: {} with {} \"{}\"", kind, selector, item),
    )
}

fn already_exists(kind: ResourceKind, name: &str) -> ApiError {
    api_error(
        StatusCode::BAD_REQUEST,
        "ObjectAlreadyExists",
        format!("already exists: {} \"{}\"", kind, name),
    )
}
