use log::info;
use url::Url;

use super::core::AzureDevOpsClient;
use super::paging::{PagedResult, DEFAULT_ITEMS_KEY};
use crate::error::Result;
use crate::providers::azure::types::{Pipeline, Run};

impl AzureDevOpsClient {
    /// Seed URL for a full listing. The window is echoed as plain `top` and
    /// `skip` parameters, which upstream does not interpret, so page sizes stay
    /// upstream's choice and the window is only ever applied locally.
    fn listing_url(&self, segments: &[&str], top: Option<usize>, skip: Option<usize>) -> Url {
        let mut url = self.endpoint(segments);
        {
            let mut query = url.query_pairs_mut();
            if let Some(top) = top {
                query.append_pair("top", &top.to_string());
            }
            if let Some(skip) = skip {
                query.append_pair("skip", &skip.to_string());
            }
        }
        url
    }

    /// Lists pipeline definitions.
    ///
    /// The whole collection is retrieved before windowing so that `total`
    /// reflects every pipeline in the project, whatever `top` and `skip` are.
    pub async fn list_pipelines(
        &self,
        top: Option<usize>,
        skip: Option<usize>,
    ) -> Result<PagedResult<Pipeline>> {
        let url = self.listing_url(&["pipelines"], top, skip);
        let all: Vec<Pipeline> = self.fetch_all_paged(&url, DEFAULT_ITEMS_KEY).await?;

        info!("Fetched {} pipelines", all.len());

        Ok(PagedResult::from_window(all, top, skip))
    }

    pub async fn get_pipeline(&self, pipeline_id: u64) -> Result<Pipeline> {
        let url = self.endpoint(&["pipelines", &pipeline_id.to_string()]);
        self.get_json(url).await
    }

    /// Lists runs of one pipeline, newest first as ordered upstream.
    pub async fn list_pipeline_runs(
        &self,
        pipeline_id: u64,
        top: Option<usize>,
        skip: Option<usize>,
    ) -> Result<PagedResult<Run>> {
        let url = self.listing_url(&["pipelines", &pipeline_id.to_string(), "runs"], top, skip);
        let all: Vec<Run> = self.fetch_all_paged(&url, DEFAULT_ITEMS_KEY).await?;

        info!("Fetched {} runs for pipeline {}", all.len(), pipeline_id);

        Ok(PagedResult::from_window(all, top, skip))
    }

    pub async fn get_run(&self, pipeline_id: u64, run_id: u64) -> Result<Run> {
        let url = self.endpoint(&[
            "pipelines",
            &pipeline_id.to_string(),
            "runs",
            &run_id.to_string(),
        ]);
        self.get_json(url).await
    }
}
