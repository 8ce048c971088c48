use crate::error::Result;
use async_trait::async_trait;
use reqwest::Method;

/// Trait for talking to the Oxide API
///
/// This is the one seam between reconciliation logic and the network: the
/// reqwest-backed `ApiClient` implements it for real invocations and
/// `MockApi` implements it in memory for tests.
#[async_trait]
pub trait OxideApi: Send + Sync {
    /// Issue one request and return the decoded JSON body.
    ///
    /// `path` is relative to the API host (e.g. "/v1/disks"), `query` is
    /// appended as URL query parameters. Responses without a body (204)
    /// yield `serde_json::Value::Null`.
    async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value>;
}
