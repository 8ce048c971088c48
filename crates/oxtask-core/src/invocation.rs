//! Parsing of the raw argument document handed to a module.
//!
//! Ansible writes the task parameters as a JSON object, mixed with its own
//! bookkeeping keys (`_ansible_check_mode`, `_ansible_verbosity`, ...). Those
//! keys are stripped here so the per-module parameter structs can reject
//! everything they do not know about.

use crate::error::{CoreError, Result};
use serde_json::{Map, Value};

/// Prefix of framework-internal keys
pub const INTERNAL_PREFIX: &str = "_ansible_";

/// Key carrying Ansible's check-mode flag
pub const CHECK_MODE_KEY: &str = "_ansible_check_mode";

/// Wrapper key used when arguments arrive in the new-style module envelope
pub const ENVELOPE_KEY: &str = "ANSIBLE_MODULE_ARGS";

/// Task parameters with the framework keys removed
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleArgs {
    pub params: Value,
    pub check_mode: bool,
}

impl ModuleArgs {
    /// Parse an arguments document. YAML is accepted, which covers JSON.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(text).map_err(|e| {
            CoreError::serialization_error(
                format!("Failed to parse module arguments: {}", e),
                Some(Box::new(e)),
            )
        })?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let mut object = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(CoreError::serialization_error(
                    format!(
                        "Module arguments must be a mapping, got {}",
                        json_type(&other)
                    ),
                    None,
                ))
            }
        };

        if object.len() == 1 && matches!(object.get(ENVELOPE_KEY), Some(Value::Object(_))) {
            if let Some(Value::Object(inner)) = object.remove(ENVELOPE_KEY) {
                object = inner;
            }
        }

        let check_mode = match object.get(CHECK_MODE_KEY) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(s)) => matches!(s.as_str(), "true" | "True" | "yes" | "1"),
            _ => false,
        };

        object.retain(|key, _| !key.starts_with(INTERNAL_PREFIX));

        Ok(Self {
            params: Value::Object(object),
            check_mode,
        })
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strips_internal_keys() {
        let args = ModuleArgs::from_value(json!({
            "name": "croissant",
            "_ansible_check_mode": true,
            "_ansible_verbosity": 3,
            "_ansible_no_log": false,
        }))
        .unwrap();

        assert!(args.check_mode);
        assert_eq!(args.params, json!({ "name": "croissant" }));
    }

    #[test]
    fn test_unwraps_envelope() {
        let args = ModuleArgs::from_value(json!({
            "ANSIBLE_MODULE_ARGS": { "name": "prod", "_ansible_check_mode": false }
        }))
        .unwrap();

        assert!(!args.check_mode);
        assert_eq!(args.params, json!({ "name": "prod" }));
    }

    #[test]
    fn test_parse_yaml() {
        let args = ModuleArgs::parse(
            "name: croissant\nsize: 10\ndisk_source:\n  type: blank\n  block_size: 4096\n",
        )
        .unwrap();

        assert!(!args.check_mode);
        assert_eq!(args.params["size"], json!(10));
        assert_eq!(args.params["disk_source"]["block_size"], json!(4096));
    }

    #[test]
    fn test_rejects_non_mapping() {
        let err = ModuleArgs::parse("- a\n- b\n").unwrap_err();
        assert!(err.to_string().contains("must be a mapping"));
    }
}
