use std::sync::Arc;

use log::{debug, error};
use serde::Serialize;
use serde_json::{json, Value};

use super::request::{ConnectorRequest, ConnectorResponse};
use super::route::{ListMode, Route};
use crate::error::Result;
use crate::providers::azure::AzureDevOpsClient;

pub const DESCRIPTOR_MESSAGE: &str = "Azure DevOps Connector API";

/// Dispatches connector requests onto an [`AzureDevOpsClient`].
#[derive(Clone)]
pub struct Router {
    client: Arc<AzureDevOpsClient>,
}

impl Router {
    pub fn new(client: Arc<AzureDevOpsClient>) -> Self {
        Self { client }
    }

    /// Handles one request end to end. Never fails: every outcome is a JSON
    /// envelope with a status code.
    pub async fn handle(&self, request: ConnectorRequest) -> ConnectorResponse {
        let route = match Route::parse(&request) {
            Ok(route) => route,
            Err(e) => {
                debug!("{} {} rejected: {}", request.method, request.path(), e);
                return ConnectorResponse::error(e.status(), e.to_string());
            }
        };

        debug!("{} {} matched {:?}", request.method, request.path(), route);

        match self.execute(route).await {
            Ok(body) => ConnectorResponse::ok(body),
            Err(e) => {
                error!("{} {} failed: {}", request.method, request.path(), e);
                ConnectorResponse::from_error(&e)
            }
        }
    }

    /// Runs a parsed route against the client.
    pub async fn execute(&self, route: Route) -> Result<Value> {
        let client = &self.client;

        match route {
            Route::Descriptor => Ok(json!({ "message": DESCRIPTOR_MESSAGE })),
            Route::ListPipelines {
                top,
                skip,
                mode: ListMode::Simple,
            } => to_json(client.list_pipelines(top, skip).await?),
            Route::ListPipelines {
                top,
                skip,
                mode: ListMode::Enriched,
            } => to_json(
                client
                    .pipelines_with_latest_run_and_artifacts(top, skip)
                    .await?,
            ),
            Route::GetPipeline { pipeline_id } => to_json(client.get_pipeline(pipeline_id).await?),
            Route::ListRuns {
                pipeline_id,
                top,
                skip,
            } => to_json(client.list_pipeline_runs(pipeline_id, top, skip).await?),
            Route::RunPipeline {
                pipeline_id,
                options,
            } => to_json(client.run_pipeline(pipeline_id, options).await?),
            Route::GetRun {
                pipeline_id,
                run_id,
            } => to_json(client.get_run(pipeline_id, run_id).await?),
            Route::CancelRun {
                pipeline_id,
                run_id,
            } => client.cancel_run(pipeline_id, run_id).await,
            Route::AddRunTags {
                pipeline_id,
                run_id,
                tags,
            } => to_json(client.add_run_tags(pipeline_id, run_id, &tags).await?),
            Route::ListArtifacts { build_id } => {
                to_json(client.list_build_artifacts(build_id).await?)
            }
            Route::ListBranches { repository_id } => {
                to_json(client.list_branches(&repository_id).await?)
            }
            Route::GetCommit {
                repository_id,
                commit_id,
            } => to_json(client.get_commit(&repository_id, &commit_id).await?),
        }
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}
