// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use oxtask_client::ApiError;
use oxtask_core::{CoreError, ResourceKind, Scope};
use thiserror::Error;

/// Reconciliation error type
#[derive(Error, Debug, Diagnostic)]
pub enum ReconcileError {
    /// More than one resource carries the target name in the same scope
    #[error("Found {count} {kind} resources named '{name}' in {scope}")]
    #[diagnostic(
        code(oxtask::reconcile::duplicate_resource),
        help("Names are expected to be unique per scope. Remove the extra resources or address them by id")
    )]
    DuplicateResource {
        kind: ResourceKind,
        name: String,
        scope: Scope,
        count: usize,
    },

    /// API error
    #[error(transparent)]
    #[diagnostic(transparent)]
    Api(#[from] ApiError),

    /// Core error
    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] CoreError),
}

/// Result type for reconciliation
pub type Result<T> = std::result::Result<T, ReconcileError>;

impl ReconcileError {
    /// Create a DuplicateResource error
    pub fn duplicate_resource(
        kind: ResourceKind,
        name: impl Into<String>,
        scope: &Scope,
        count: usize,
    ) -> Self {
        Self::DuplicateResource {
            kind,
            name: name.into(),
            scope: scope.clone(),
            count,
        }
    }

    /// The API's error body, reported back to the caller as `response`
    pub fn response_body(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Api(e) => e.response_body(),
            _ => None,
        }
    }
}
