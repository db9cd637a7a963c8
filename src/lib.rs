//! Connector for the Azure DevOps pipelines REST API.
//!
//! [`providers::azure::AzureDevOpsClient`] is a paginating, aggregating facade
//! over pipelines, runs, builds and repositories; [`router::Router`] maps
//! path-segment requests onto it and returns JSON envelopes.

pub mod auth;
pub mod error;
pub mod providers;
pub mod router;

pub use error::{ConnectorError, Result};
