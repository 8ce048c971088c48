//! Oxtask Core - Shared types for declarative Oxide resource tasks
//!
//! This crate provides:
//! - Resource kinds, scopes, records and reconciliation outcomes
//! - Create-time payloads in the Oxide API wire format
//! - Name and quantity validation
//! - Error types with miette diagnostics
//! - The normalized module result

pub mod error;
pub mod invocation;
pub mod resources;
pub mod result;
pub mod types;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use invocation::ModuleArgs;
pub use resources::{is_valid_name, validate_name, ResourceSpec};
pub use result::ModuleResult;
pub use types::{
    ApiToken, Desired, DesiredState, PlannedAction, ReconciliationOutcome, ResourceKind,
    ResourceRecord, ResultsPage, Scope, Task,
};

/// Serialize a value to JSON
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| {
        CoreError::serialization_error(
            format!("Failed to serialize to JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trip_of_result() {
        let result = ModuleResult::failure("boom", None);

        let json = to_json(&result).unwrap();
        assert!(json.contains("boom"));

        let back: ModuleResult = serde_json::from_str(&json).unwrap();
        assert!(back.failed);
        assert_eq!(back.msg.as_deref(), Some("boom"));
    }
}
