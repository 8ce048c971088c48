use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::traits::OxideApi;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode, Url};
use tracing::{debug, warn};

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("oxtask/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the Oxide API
///
/// Holds one connection pool and the bearer credentials for a single
/// invocation. There is no retry: every failure is returned to the caller.
pub struct ApiClient {
    base_url: Url,
    client: Client,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let base_url = config.base_url()?;

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.token.expose()))
            .map_err(|_| {
                ApiError::configuration(
                    "oxide_token contains characters that are not allowed in an HTTP header",
                    "Copy the token again without surrounding whitespace or line breaks",
                )
            })?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::network(format!("Failed to build HTTP client: {}", e), Some(e)))?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    fn url_for(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url(), path)).map_err(|e| {
            ApiError::configuration(
                format!("Cannot build request URL for '{}': {}", path, e),
                "Check oxide_host",
            )
        })?;

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        Ok(url)
    }
}

#[async_trait]
impl OxideApi for ApiClient {
    async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let url = self.url_for(path, query)?;
        debug!("{} {}", method, url);

        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let resp = request.send().await.map_err(|e| {
            ApiError::network(format!("{} {} failed: {}", method, url, e), Some(e))
        })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| {
            ApiError::network(
                format!("Failed to read response body of {} {}: {}", method, url, e),
                Some(e),
            )
        })?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "{} {} was rejected", method, path);
            return Err(ApiError::from_status(status, &text));
        }

        if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            ApiError::malformed_response(format!(
                "{} {} returned invalid JSON: {}",
                method, path, e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reqwest::Method;
    use oxtask_core::ApiToken;
    use serde_json::json;

    fn test_client(server: &MockServer) -> ApiClient {
        let config = ClientConfig::new(server.base_url(), ApiToken::new("test-token"));
        ApiClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_sends_bearer_token_and_query() {
        let server = MockServer::start_async().await;
        let m = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/disks")
                    .query_param("project", "bakery")
                    .header("authorization", "Bearer test-token");
                then.status(200)
                    .json_body(json!({ "items": [], "next_page": null }));
            })
            .await;

        let client = test_client(&server);
        let body = client
            .call(
                Method::GET,
                "/v1/disks",
                &[("project".to_string(), "bakery".to_string())],
                None,
            )
            .await
            .unwrap();

        m.assert_async().await;
        assert_eq!(body["items"], json!([]));
    }

    #[tokio::test]
    async fn test_posts_json_body() {
        let server = MockServer::start_async().await;
        let m = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/projects")
                    .header("content-type", "application/json")
                    .json_body(json!({ "name": "prod", "description": "" }));
                then.status(201).json_body(json!({
                    "id": "0f3a7c1e-4b2d-4e5f-8a9b-1c2d3e4f5a6b",
                    "name": "prod",
                    "description": ""
                }));
            })
            .await;

        let client = test_client(&server);
        let body = client
            .call(
                Method::POST,
                "/v1/projects",
                &[],
                Some(&json!({ "name": "prod", "description": "" })),
            )
            .await
            .unwrap();

        m.assert_async().await;
        assert_eq!(body["name"], "prod");
    }

    #[tokio::test]
    async fn test_no_content_is_null() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/v1/projects/prod");
                then.status(204);
            })
            .await;

        let client = test_client(&server);
        let body = client
            .call(Method::DELETE, "/v1/projects/prod", &[], None)
            .await
            .unwrap();
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn test_error_statuses_are_mapped() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/projects");
                then.status(401).json_body(json!({
                    "request_id": "req-1",
                    "error_code": null,
                    "message": "credentials missing or invalid"
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/disks/missing");
                then.status(404).json_body(json!({
                    "request_id": "req-2",
                    "error_code": "ObjectNotFound",
                    "message": "not found: disk with name \"missing\""
                }));
            })
            .await;

        let client = test_client(&server);

        let err = client
            .call(Method::GET, "/v1/projects", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized { status: 401, .. }));

        let err = client
            .call(Method::GET, "/v1/disks/missing", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));
        assert_eq!(err.response_body().unwrap()["request_id"], "req-2");
    }

    #[tokio::test]
    async fn test_invalid_json_is_malformed_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/projects");
                then.status(200).body("<html>login</html>");
            })
            .await;

        let client = test_client(&server);
        let err = client
            .call(Method::GET, "/v1/projects", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        // Port 9 (discard) on localhost is almost never listening
        let config = ClientConfig::new("http://127.0.0.1:9", ApiToken::new("t"));
        let client = ApiClient::new(&config).unwrap();
        let err = client
            .call(Method::GET, "/v1/projects", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Network { .. }));
    }

    #[test]
    fn test_rejects_blank_token() {
        let config = ClientConfig::new("https://oxide.example.com", ApiToken::new(""));
        assert!(matches!(
            ApiClient::new(&config),
            Err(ApiError::Configuration { .. })
        ));
    }
}
