// Allow unused assignments for diagnostic fields - they're used by the thiserror/miette macros
#![allow(unused_assignments)]

//! Oxtask Client - Access to the Oxide API
//!
//! `OxideApi` is the request seam used by reconciliation. `ApiClient` speaks
//! HTTP with bearer authentication; `MockApi` keeps an in-memory model of the
//! same endpoints for tests.

pub mod api_client;
pub mod config;
pub mod error;
pub mod mock;
pub mod traits;

pub use api_client::ApiClient;
pub use config::ClientConfig;
pub use error::{ApiError, ErrorBody, Result};
pub use mock::{MockApi, MockCall};
pub use traits::OxideApi;

// Re-exported so callers can name request methods without depending on reqwest
pub use reqwest::Method;
