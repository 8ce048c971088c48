use crate::error::{ApiError, Result};
use oxtask_core::ApiToken;
use reqwest::Url;

/// Connection settings for one invocation: where the API lives and how to authenticate
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the Oxide API (e.g. "https://oxide.example.com")
    pub host: String,
    /// Bearer token sent with every request
    pub token: ApiToken,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, token: ApiToken) -> Self {
        Self {
            host: host.into(),
            token,
        }
    }

    /// Build a config from task-level values, falling back to process-level ones
    /// (CLI flags or environment) for whichever is missing.
    pub fn resolve(
        host: Option<&str>,
        token: Option<&ApiToken>,
        fallback_host: Option<&str>,
        fallback_token: Option<&ApiToken>,
    ) -> Result<Self> {
        let host = host
            .filter(|h| !h.trim().is_empty())
            .or(fallback_host.filter(|h| !h.trim().is_empty()))
            .ok_or_else(|| {
                ApiError::configuration(
                    "oxide_host is required",
                    "Set the oxide_host task parameter, pass --host, or export OXIDE_HOST",
                )
            })?;

        let token = token
            .filter(|t| !t.is_blank())
            .or(fallback_token.filter(|t| !t.is_blank()))
            .ok_or_else(|| {
                ApiError::configuration(
                    "oxide_token is required",
                    "Set the oxide_token task parameter, pass --token, or export OXIDE_TOKEN",
                )
            })?;

        let config = Self::new(host, token.clone());
        config.validate()?;
        Ok(config)
    }

    /// Check that both settings are usable before the first request
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ApiError::configuration(
                "oxide_host is empty",
                "Set oxide_host to the base URL of the Oxide API",
            ));
        }

        if self.token.is_blank() {
            return Err(ApiError::configuration(
                "oxide_token is empty",
                "Create a device token with `oxide auth login` and pass it as oxide_token",
            ));
        }

        self.base_url().map(|_| ())
    }

    /// The host parsed as a URL, without a trailing slash
    pub fn base_url(&self) -> Result<Url> {
        let trimmed = self.host.trim().trim_end_matches('/');
        let url = Url::parse(trimmed).map_err(|e| {
            ApiError::configuration(
                format!("oxide_host '{}' is not a valid URL: {}", self.host, e),
                "Use a full URL including the scheme, e.g. https://oxide.example.com",
            )
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ApiError::configuration(
                format!("oxide_host uses unsupported scheme '{}'", other),
                "Use an http:// or https:// URL",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_task_values() {
        let task_token = ApiToken::new("task-token");
        let env_token = ApiToken::new("env-token");
        let config = ClientConfig::resolve(
            Some("https://task.example.com"),
            Some(&task_token),
            Some("https://env.example.com"),
            Some(&env_token),
        )
        .unwrap();

        assert_eq!(config.host, "https://task.example.com");
        assert_eq!(config.token.expose(), "task-token");
    }

    #[test]
    fn test_resolve_falls_back() {
        let env_token = ApiToken::new("env-token");
        let config = ClientConfig::resolve(
            Some(""),
            None,
            Some("https://env.example.com"),
            Some(&env_token),
        )
        .unwrap();

        assert_eq!(config.host, "https://env.example.com");
        assert_eq!(config.token.expose(), "env-token");
    }

    #[test]
    fn test_missing_values_are_configuration_errors() {
        let token = ApiToken::new("t");
        let err = ClientConfig::resolve(None, Some(&token), None, None).unwrap_err();
        assert!(matches!(err, ApiError::Configuration { .. }));

        let blank = ApiToken::new("   ");
        let err = ClientConfig::resolve(Some("https://h"), Some(&blank), None, None).unwrap_err();
        assert!(err.to_string().contains("oxide_token"));
    }

    #[test]
    fn test_host_must_be_http_url() {
        let token = ApiToken::new("t");
        assert!(ClientConfig::new("oxide.example.com", token.clone())
            .validate()
            .is_err());
        assert!(ClientConfig::new("ftp://oxide.example.com", token.clone())
            .validate()
            .is_err());
        assert!(ClientConfig::new("https://oxide.example.com/", token)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let config = ClientConfig::new("https://h", ApiToken::new("super-secret"));
        assert!(!format!("{:?}", config).contains("super-secret"));
    }
}
