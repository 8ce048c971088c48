// Allow unused assignments for diagnostic fields - they're used by the thiserror/miette macros
#![allow(unused_assignments)]

//! Oxtask Reconcile - Desired-state convergence for Oxide resources
//!
//! - `locator`: find a resource by name within its scope
//! - `reconciler`: decide and apply create, update, delete or no-op
//! - `modules`: per-module parameters and the `execute` entry point

pub mod error;
pub mod locator;
pub mod modules;
pub mod reconciler;

pub use error::{ReconcileError, Result};
pub use locator::Locator;
pub use modules::{execute, ModuleName, ModuleParams, ModuleRequest};
pub use reconciler::Reconciler;
