use miette::Diagnostic;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Error body returned by the Oxide API on non-2xx responses
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Error code the API uses for name collisions on create
pub const OBJECT_ALREADY_EXISTS: &str = "ObjectAlreadyExists";

/// API client error type
#[derive(Error, Debug, Diagnostic)]
pub enum ApiError {
    /// Host or token missing or unusable
    #[error("Invalid client configuration: {message}")]
    #[diagnostic(code(oxtask::client::configuration), help("{suggestion}"))]
    Configuration {
        #[allow(unused)]
        message: String,
        #[allow(unused)]
        suggestion: String,
    },

    /// 404 from the API
    #[error("Not found: {message}")]
    #[diagnostic(
        code(oxtask::client::not_found),
        help("Verify that referenced resources (project, image, snapshot, disk) exist and that the ids are correct")
    )]
    NotFound {
        #[allow(unused)]
        message: String,
        #[allow(unused)]
        body: Option<serde_json::Value>,
    },

    /// 401 or 403 from the API
    #[error("Unauthorized ({status}): {message}")]
    #[diagnostic(
        code(oxtask::client::unauthorized),
        help("Check that oxide_token is a valid, unexpired device token with access to this silo")
    )]
    Unauthorized {
        #[allow(unused)]
        status: u16,
        #[allow(unused)]
        message: String,
        #[allow(unused)]
        body: Option<serde_json::Value>,
    },

    /// 409, or a create rejected because the name is taken
    #[error("Conflict: {message}")]
    #[diagnostic(
        code(oxtask::client::conflict),
        help("Another resource with this name exists or the resource is in a state that does not allow this operation")
    )]
    Conflict {
        #[allow(unused)]
        message: String,
        #[allow(unused)]
        body: Option<serde_json::Value>,
    },

    /// Other 4xx; the API's validation message is kept verbatim
    #[error("Request rejected ({status}): {message}")]
    #[diagnostic(
        code(oxtask::client::bad_request),
        help("The API refused the request as sent. The message above comes from the API")
    )]
    BadRequest {
        #[allow(unused)]
        status: u16,
        #[allow(unused)]
        message: String,
        #[allow(unused)]
        body: Option<serde_json::Value>,
    },

    /// 5xx from the API
    #[error("Server error ({status}): {message}")]
    #[diagnostic(
        code(oxtask::client::server_error),
        help("The control plane failed to handle the request. Retry the task later or check the request id with the rack operator")
    )]
    ServerError {
        #[allow(unused)]
        status: u16,
        #[allow(unused)]
        message: String,
        #[allow(unused)]
        body: Option<serde_json::Value>,
    },

    /// Transport failure before a response arrived
    #[error("Network error: {message}")]
    #[diagnostic(
        code(oxtask::client::network_error),
        help("Verify oxide_host is reachable from the machine running the task")
    )]
    Network {
        #[allow(unused)]
        message: String,
        #[source]
        #[allow(unused)]
        source: Option<reqwest::Error>,
    },

    /// 2xx with a body that could not be decoded
    #[error("Malformed response: {message}")]
    #[diagnostic(
        code(oxtask::client::malformed_response),
        help("The API returned a body this client does not understand. Check that oxide_host points at an Oxide API endpoint")
    )]
    MalformedResponse {
        #[allow(unused)]
        message: String,
    },

    /// Core library error
    #[error(transparent)]
    #[diagnostic(transparent)]
    CoreError(#[from] oxtask_core::CoreError),
}

/// Result type alias for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn configuration(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn network(message: impl Into<String>, source: Option<reqwest::Error>) -> Self {
        Self::Network {
            message: message.into(),
            source,
        }
    }

    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Map a non-2xx status and its raw body onto the error taxonomy
    pub fn from_status(status: StatusCode, raw_body: &str) -> Self {
        let body: Option<serde_json::Value> = serde_json::from_str(raw_body).ok();
        let parsed: ErrorBody = body
            .as_ref()
            .and_then(|b| serde_json::from_value(b.clone()).ok())
            .unwrap_or_default();

        let message = if !parsed.message.is_empty() {
            parsed.message.clone()
        } else if !raw_body.trim().is_empty() {
            raw_body.trim().to_string()
        } else {
            status
                .canonical_reason()
                .unwrap_or("no response body")
                .to_string()
        };
        let code = status.as_u16();

        match status {
            StatusCode::NOT_FOUND => Self::NotFound { message, body },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized {
                status: code,
                message,
                body,
            },
            StatusCode::CONFLICT => Self::Conflict { message, body },
            s if s.is_client_error()
                && parsed.error_code.as_deref() == Some(OBJECT_ALREADY_EXISTS) =>
            {
                Self::Conflict { message, body }
            }
            s if s.is_client_error() => Self::BadRequest {
                status: code,
                message,
                body,
            },
            s if s.is_server_error() => Self::ServerError {
                status: code,
                message,
                body,
            },
            _ => Self::MalformedResponse {
                message: format!("unexpected status {}: {}", status, message),
            },
        }
    }

    /// The API's error body, when this error came from a response
    pub fn response_body(&self) -> Option<&serde_json::Value> {
        match self {
            Self::NotFound { body, .. }
            | Self::Unauthorized { body, .. }
            | Self::Conflict { body, .. }
            | Self::BadRequest { body, .. }
            | Self::ServerError { body, .. } => body.as_ref(),
            _ => None,
        }
    }
}
