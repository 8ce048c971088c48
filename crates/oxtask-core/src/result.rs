use crate::types::{ReconciliationOutcome, ResourceKind, ResourceRecord};
use serde::{Deserialize, Serialize};

/// The normalized result a module prints for its caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleResult {
    pub changed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<ResourceRecord>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Error body returned by the API, when the failure came from it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
}

impl ModuleResult {
    /// Render a reconciliation outcome for `kind`
    pub fn from_outcome(kind: ResourceKind, outcome: ReconciliationOutcome) -> Self {
        let label = kind.label();
        let changed = outcome.changed();

        match outcome {
            ReconciliationOutcome::Unchanged { record, warnings } => {
                let msg = if record.is_some() {
                    format!("{} already present", label)
                } else {
                    format!("{} not present", label)
                };
                Self {
                    changed,
                    resource: record,
                    msg: Some(msg),
                    warnings,
                    ..Default::default()
                }
            }
            ReconciliationOutcome::Created(record) => Self {
                changed,
                resource: Some(record),
                msg: Some(format!("{} created", label)),
                ..Default::default()
            },
            ReconciliationOutcome::Updated(record) => Self {
                changed,
                resource: Some(record),
                msg: Some(format!("{} updated", label)),
                ..Default::default()
            },
            ReconciliationOutcome::Deleted(_) => Self {
                changed,
                msg: Some(format!("{} deleted", label)),
                ..Default::default()
            },
            ReconciliationOutcome::Planned(action) => Self {
                changed,
                msg: Some(format!("{} would be {} (check mode)", label, action)),
                ..Default::default()
            },
        }
    }

    /// Read-only result carrying a list of records
    pub fn listing(records: Vec<ResourceRecord>) -> Self {
        Self {
            changed: false,
            resources: Some(records),
            ..Default::default()
        }
    }

    /// Failed invocation with a human readable message
    pub fn failure(msg: impl Into<String>, response: Option<serde_json::Value>) -> Self {
        Self {
            changed: false,
            failed: true,
            msg: Some(msg.into()),
            response,
            ..Default::default()
        }
    }
}
