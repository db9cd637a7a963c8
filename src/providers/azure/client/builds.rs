use serde_json::Value;

use super::core::{decode, AzureDevOpsClient};
use super::paging::DEFAULT_ITEMS_KEY;
use crate::error::Result;
use crate::providers::azure::types::Artifact;

impl AzureDevOpsClient {
    /// Lists the artifacts published by a build. Single page; a missing
    /// `value` key is an empty list.
    pub async fn list_build_artifacts(&self, build_id: u64) -> Result<Vec<Artifact>> {
        let url = self.endpoint(&["build", "builds", &build_id.to_string(), "artifacts"]);
        let (_, body) = self.exchange(self.client.get(url)).await?;

        let mut page: Value = decode(&body)?;
        match page.get_mut(DEFAULT_ITEMS_KEY).map(Value::take) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(items) => Ok(serde_json::from_value(items)?),
        }
    }
}
