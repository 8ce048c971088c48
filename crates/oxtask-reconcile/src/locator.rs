use crate::error::{ReconcileError, Result};
use oxtask_client::{ApiError, Method, OxideApi};
use oxtask_core::{ResourceKind, ResourceRecord, ResultsPage, Scope};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Page size requested on every list call
pub const PAGE_LIMIT: usize = 100;

/// Finds existing resources by listing a collection and filtering by name
///
/// Read-only: the locator never issues a write.
#[derive(Clone)]
pub struct Locator {
    api: Arc<dyn OxideApi>,
}

impl Locator {
    pub fn new(api: Arc<dyn OxideApi>) -> Self {
        Self { api }
    }

    /// List every resource of `kind` in `scope`, following `next_page` to the end
    pub async fn list(&self, kind: ResourceKind, scope: &Scope) -> Result<Vec<ResourceRecord>> {
        let path = kind.collection_path();
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;
        let mut seen_tokens: HashSet<String> = HashSet::new();

        loop {
            let mut query = scope.query();
            query.push(("limit".to_string(), PAGE_LIMIT.to_string()));
            if let Some(token) = &page_token {
                query.push(("page_token".to_string(), token.clone()));
            }

            let body = self.api.call(Method::GET, &path, &query, None).await?;
            let page: ResultsPage<ResourceRecord> = serde_json::from_value(body).map_err(|e| {
                ApiError::malformed_response(format!(
                    "{} list response could not be decoded: {}",
                    kind, e
                ))
            })?;
            records.extend(page.items);

            match page.next_page {
                Some(next) if !seen_tokens.insert(next.clone()) => {
                    return Err(ApiError::malformed_response(format!(
                        "{} list returned page token '{}' twice",
                        kind, next
                    ))
                    .into());
                }
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(%kind, %scope, count = records.len(), "Listed resources");
        Ok(records)
    }

    /// Find the single resource named `name`
    ///
    /// Returns `None` when nothing matches and `DuplicateResource` when more
    /// than one resource does.
    pub async fn find(
        &self,
        kind: ResourceKind,
        scope: &Scope,
        name: &str,
    ) -> Result<Option<ResourceRecord>> {
        let mut matches: Vec<ResourceRecord> = self
            .list(kind, scope)
            .await?
            .into_iter()
            .filter(|r| r.name == name)
            .collect();

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            count => Err(ReconcileError::duplicate_resource(kind, name, scope, count)),
        }
    }

    /// Fetch one resource by id
    pub async fn get(&self, kind: ResourceKind, id: Uuid) -> Result<ResourceRecord> {
        let body = self
            .api
            .call(Method::GET, &kind.item_path(&id.to_string()), &[], None)
            .await?;
        decode_record(kind, body)
    }
}

/// Decode a single-resource response body
pub(crate) fn decode_record(kind: ResourceKind, body: serde_json::Value) -> Result<ResourceRecord> {
    serde_json::from_value(body).map_err(|e| {
        ApiError::malformed_response(format!("{} response could not be decoded: {}", kind, e))
            .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxtask_client::MockApi;
    use serde_json::json;

    fn bakery() -> Scope {
        Scope::Project("bakery".to_string())
    }

    #[tokio::test]
    async fn test_find_on_third_page() {
        let api = Arc::new(MockApi::new().with_page_size(2));
        api.add_project("bakery").await;
        for name in ["baguette", "brioche", "ciabatta", "focaccia", "croissant"] {
            api.seed(ResourceKind::Disk, &bakery(), name, json!({})).await;
        }

        let locator = Locator::new(api.clone());
        let found = locator
            .find(ResourceKind::Disk, &bakery(), "croissant")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "croissant");

        let calls = api.calls().await;
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].query_param("limit"), Some("100"));
        assert_eq!(calls[0].query_param("page_token"), None);
        assert_eq!(calls[2].query_param("page_token"), Some("4"));
        assert!(calls.iter().all(|c| c.query_param("project") == Some("bakery")));
    }

    #[tokio::test]
    async fn test_find_missing_is_none() {
        let api = Arc::new(MockApi::new());
        api.seed(ResourceKind::SshKey, &Scope::CurrentUser, "laptop", json!({}))
            .await;

        let locator = Locator::new(api);
        let found = locator
            .find(ResourceKind::SshKey, &Scope::CurrentUser, "desktop")
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_find_duplicate_is_error() {
        let api = Arc::new(MockApi::new());
        api.add_project("prod").await;
        api.add_project("prod").await;

        let locator = Locator::new(api.clone());
        let err = locator
            .find(ResourceKind::Project, &Scope::Silo, "prod")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::DuplicateResource { count: 2, .. }
        ));
        assert_eq!(api.write_calls().await, 0);
    }

    #[tokio::test]
    async fn test_get_by_id_has_no_scope_query() {
        let api = Arc::new(MockApi::new());
        api.add_project("bakery").await;
        let disk = api
            .seed(ResourceKind::Disk, &bakery(), "croissant", json!({ "size": 1024 }))
            .await;

        let locator = Locator::new(api.clone());
        let record = locator.get(ResourceKind::Disk, disk.id).await.unwrap();
        assert_eq!(record.name, "croissant");

        let calls = api.calls().await;
        assert_eq!(calls[0].path, format!("/v1/disks/{}", disk.id));
        assert!(calls[0].query.is_empty());
    }

    #[tokio::test]
    async fn test_cycling_page_tokens_are_rejected() {
        // Hands out tokens a, b, a, ... forever
        struct Cycling {
            calls: std::sync::atomic::AtomicUsize,
        }

        #[async_trait::async_trait]
        impl OxideApi for Cycling {
            async fn call(
                &self,
                _method: Method,
                _path: &str,
                _query: &[(String, String)],
                _body: Option<&serde_json::Value>,
            ) -> oxtask_client::Result<serde_json::Value> {
                let n = self
                    .calls
                    .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                let next = if n % 2 == 0 { "a" } else { "b" };
                Ok(json!({ "items": [], "next_page": next }))
            }
        }

        let api = Arc::new(Cycling {
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let locator = Locator::new(api.clone());
        let err = locator
            .list(ResourceKind::Project, &Scope::Silo)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Api(ApiError::MalformedResponse { .. })
        ));
        assert_eq!(api.calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_malformed_list_is_reported() {
        struct Garbage;

        #[async_trait::async_trait]
        impl OxideApi for Garbage {
            async fn call(
                &self,
                _method: Method,
                _path: &str,
                _query: &[(String, String)],
                _body: Option<&serde_json::Value>,
            ) -> oxtask_client::Result<serde_json::Value> {
                Ok(json!({ "unexpected": true }))
            }
        }

        let locator = Locator::new(Arc::new(Garbage));
        let err = locator
            .list(ResourceKind::Project, &Scope::Silo)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Api(ApiError::MalformedResponse { .. })
        ));
    }
}
