// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Core error type for parameter handling and resource modelling
#[derive(Error, Debug, Diagnostic)]
pub enum CoreError {
    /// Resource name rejected by the naming rules
    #[error("Invalid name '{name}': {reason}")]
    #[diagnostic(
        code(oxtask::invalid_name),
        help("Names are 1-63 characters, start with a lowercase letter, contain only lowercase letters, digits and '-', do not end with '-', and are not UUIDs")
    )]
    InvalidName {
        #[allow(unused)]
        name: String,
        #[allow(unused)]
        reason: String,
    },

    /// A parameter is required for the requested state but was not given
    #[error("Parameter '{parameter}' is required when {condition}")]
    #[diagnostic(
        code(oxtask::missing_parameter),
        help("Add '{parameter}' to the task parameters")
    )]
    MissingParameter {
        #[allow(unused)]
        parameter: String,
        #[allow(unused)]
        condition: String,
    },

    /// A parameter is present but its value is not acceptable
    #[error("Invalid value for '{parameter}': {details}")]
    #[diagnostic(code(oxtask::validation_failed), help("{help_text}"))]
    ValidationFailed {
        #[allow(unused)]
        parameter: String,
        #[allow(unused)]
        details: String,
        #[allow(unused)]
        help_text: String,
    },

    /// The parameter document does not match the module's schema
    #[error("Unsupported parameters for module {module}: {message}")]
    #[diagnostic(
        code(oxtask::invalid_parameters),
        help("Check the parameter names and types against the module documentation. Unknown parameters are rejected")
    )]
    InvalidParameters {
        #[allow(unused)]
        module: String,
        #[allow(unused)]
        message: String,
    },

    /// Unknown module name
    #[error("Unknown module: {module}")]
    #[diagnostic(
        code(oxtask::unknown_module),
        help("Supported modules: oxide_disk, oxide_disk_info, oxide_image, oxide_instance, oxide_project, oxide_snapshot, oxide_ssh_key")
    )]
    UnknownModule {
        #[allow(unused)]
        module: String,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(
        code(oxtask::serialization_error),
        help("Ensure the parameters file is valid JSON or YAML")
    )]
    SerializationError {
        #[allow(unused)]
        message: String,
        #[source]
        #[allow(unused)]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create an InvalidName error
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a MissingParameter error
    pub fn missing_parameter(parameter: impl Into<String>, condition: impl Into<String>) -> Self {
        Self::MissingParameter {
            parameter: parameter.into(),
            condition: condition.into(),
        }
    }

    /// Create a ValidationFailed error
    pub fn validation_failed(
        parameter: impl Into<String>,
        details: impl Into<String>,
        help_text: impl Into<String>,
    ) -> Self {
        Self::ValidationFailed {
            parameter: parameter.into(),
            details: details.into(),
            help_text: help_text.into(),
        }
    }

    /// Create an InvalidParameters error
    pub fn invalid_parameters(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameters {
            module: module.into(),
            message: message.into(),
        }
    }

    /// Create an UnknownModule error
    pub fn unknown_module(module: impl Into<String>) -> Self {
        Self::UnknownModule {
            module: module.into(),
        }
    }

    /// Create a SerializationError
    pub fn serialization_error(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::SerializationError {
            message: message.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CoreError::missing_parameter("size", "state is 'present'");
        assert!(matches!(err, CoreError::MissingParameter { .. }));
        assert_eq!(
            err.to_string(),
            "Parameter 'size' is required when state is 'present'"
        );

        let err = CoreError::validation_failed("size", "must be positive", "Use a size in GiB");
        assert!(matches!(err, CoreError::ValidationFailed { .. }));
    }

    #[test]
    fn test_diagnostic_code() {
        let err = CoreError::unknown_module("oxide_vpc");
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("oxtask::unknown_module"));
    }
}
