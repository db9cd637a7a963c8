use super::core::AzureDevOpsClient;
use super::paging::DEFAULT_ITEMS_KEY;
use crate::error::Result;
use crate::providers::azure::types::{Branch, Commit, GitRef};

impl AzureDevOpsClient {
    pub async fn get_commit(&self, repository_id: &str, commit_id: &str) -> Result<Commit> {
        let url = self.endpoint(&["git", "repositories", repository_id, "commits", commit_id]);
        self.get_json(url).await
    }

    /// Lists the branches of a repository.
    ///
    /// `name` is the short display name; `ref` stays fully qualified because
    /// that is what run triggers expect as `refName`. Refs without a name are
    /// dropped.
    pub async fn list_branches(&self, repository_id: &str) -> Result<Vec<Branch>> {
        let mut url = self.endpoint(&["git", "repositories", repository_id, "refs"]);
        url.query_pairs_mut().append_pair("filter", "heads/");

        let refs: Vec<GitRef> = self.fetch_all_paged(&url, DEFAULT_ITEMS_KEY).await?;
        Ok(refs.into_iter().filter_map(Branch::from_ref).collect())
    }
}
