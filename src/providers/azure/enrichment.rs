use std::future::Future;

use futures::future::join_all;
use log::{info, warn};
use serde::Serialize;

use super::client::{AzureDevOpsClient, PagedResult};
use super::types::{Artifact, Pipeline, Run};
use crate::error::Result;

/// A pipeline with its latest run, that run's artifacts and the subject line
/// of the commit it built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedPipeline {
    pub id: u64,
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub latest_run: Option<Run>,
    pub artifacts: Vec<Artifact>,
    pub commit_subject: Option<String>,
}

/// One slot of the enriched listing. Pipelines whose enrichment failed are
/// returned as the plain upstream record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PipelineEntry {
    Enriched(EnrichedPipeline),
    Base(Pipeline),
}

impl AzureDevOpsClient {
    /// Lists pipelines and enriches each one concurrently.
    ///
    /// Within a pipeline the latest run is fetched first; artifacts and the
    /// commit subject are then looked up best-effort. A pipeline whose run
    /// listing fails degrades to its base record instead of failing the batch.
    /// Items keep the order of the base listing.
    pub async fn pipelines_with_latest_run_and_artifacts(
        &self,
        top: Option<usize>,
        skip: Option<usize>,
    ) -> Result<PagedResult<PipelineEntry>> {
        let page = self.list_pipelines(top, skip).await?;

        info!(
            "Enriching {} of {} pipelines in parallel...",
            page.items.len(),
            page.total
        );

        let total = page.total;
        let items = join_all(
            page.items
                .into_iter()
                .map(|pipeline| self.enrich_or_fallback(pipeline)),
        )
        .await;

        Ok(PagedResult { total, items })
    }

    async fn enrich_or_fallback(&self, pipeline: Pipeline) -> PipelineEntry {
        let Some(pipeline_id) = pipeline.id() else {
            warn!("Skipping enrichment of a pipeline without an id");
            return PipelineEntry::Base(pipeline);
        };

        match self.enrich_pipeline(pipeline_id, &pipeline).await {
            Ok(enriched) => PipelineEntry::Enriched(enriched),
            Err(e) => {
                warn!("Failed to fetch details for pipeline {}: {}", pipeline_id, e);
                PipelineEntry::Base(pipeline)
            }
        }
    }

    async fn enrich_pipeline(
        &self,
        pipeline_id: u64,
        pipeline: &Pipeline,
    ) -> Result<EnrichedPipeline> {
        let latest_run = self
            .list_pipeline_runs(pipeline_id, Some(1), None)
            .await?
            .items
            .into_iter()
            .next();

        let (artifacts, commit_subject) = match &latest_run {
            Some(run) => tokio::join!(self.run_artifacts(run), self.run_commit_subject(run)),
            None => (Vec::new(), None),
        };

        Ok(EnrichedPipeline {
            id: pipeline_id,
            name: pipeline.name().map(str::to_string),
            url: pipeline.web_url().map(str::to_string),
            latest_run,
            artifacts,
            commit_subject,
        })
    }

    async fn run_artifacts(&self, run: &Run) -> Vec<Artifact> {
        let Some(build_id) = run.build_id() else {
            return Vec::new();
        };

        best_effort(self.list_build_artifacts(build_id), || {
            format!("artifacts for build {build_id}")
        })
        .await
        .unwrap_or_default()
    }

    async fn run_commit_subject(&self, run: &Run) -> Option<String> {
        let (repository_id, commit_id) = run.source_commit()?;

        best_effort(self.get_commit(repository_id, commit_id), || {
            format!("commit {commit_id} in repository {repository_id}")
        })
        .await
        .map(|commit| commit.subject())
    }
}

/// Awaits `operation`, logging and discarding a failure.
async fn best_effort<T>(
    operation: impl Future<Output = Result<T>>,
    describe: impl FnOnce() -> String,
) -> Option<T> {
    match operation.await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Failed to fetch {}: {}", describe(), e);
            None
        }
    }
}
