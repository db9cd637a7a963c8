use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::core::{decode, AzureDevOpsClient};
use crate::error::Result;

pub(super) const DEFAULT_ITEMS_KEY: &str = "value";
const CONTINUATION_FIELD: &str = "continuationToken";
const CONTINUATION_HEADER: &str = "x-ms-continuationtoken";

/// A window over a fully retrieved collection.
///
/// `total` always counts the whole collection, independent of the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub total: usize,
    pub items: Vec<T>,
}

impl<T> PagedResult<T> {
    /// Slices `all` to `[skip, skip + top)`. A `top` of zero means "no limit".
    pub fn from_window(all: Vec<T>, top: Option<usize>, skip: Option<usize>) -> Self {
        let total = all.len();
        let start = skip.unwrap_or(0).min(total);
        let end = match top.filter(|top| *top > 0) {
            Some(top) => start.saturating_add(top).min(total),
            None => total,
        };

        let items = all.into_iter().skip(start).take(end - start).collect();
        Self { total, items }
    }
}

impl AzureDevOpsClient {
    /// Fetches every page reachable from `seed`, following continuation tokens.
    ///
    /// Each follow-up page is requested as `seed` plus a `continuationToken`
    /// parameter. A page without `items_key` contributes nothing.
    pub(super) async fn fetch_all_paged<T: DeserializeOwned>(
        &self,
        seed: &Url,
        items_key: &str,
    ) -> Result<Vec<T>> {
        let mut all = Vec::new();
        let mut next = Some(seed.clone());
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            let (headers, body) = self.exchange(self.client.get(url)).await?;
            let mut page: Value = decode(&body)?;
            pages += 1;

            let items = match page.get_mut(items_key).map(Value::take) {
                None | Some(Value::Null) => Vec::new(),
                Some(items) => serde_json::from_value::<Vec<T>>(items)?,
            };
            all.extend(items);

            let token = page
                .get(CONTINUATION_FIELD)
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| {
                    headers
                        .get(CONTINUATION_HEADER)
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string)
                })
                .filter(|token| !token.is_empty());

            if let Some(token) = token {
                let mut url = seed.clone();
                url.query_pairs_mut().append_pair(CONTINUATION_FIELD, &token);
                next = Some(url);
            }
        }

        debug!("Fetched {} items across {} page(s) from {}", all.len(), pages, seed.path());
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectorError;
    use crate::providers::azure::client::ClientConfig;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client_for(server: &Server) -> AzureDevOpsClient {
        let mut config = ClientConfig::new("org", "proj", "pat");
        config.base_url = Some(server.url());
        AzureDevOpsClient::new(config).unwrap()
    }

    #[test]
    fn test_window_skip_and_top() {
        let all: Vec<u32> = (0..23).collect();
        let page = PagedResult::from_window(all, Some(10), Some(5));

        assert_eq!(page.total, 23);
        assert_eq!(page.items, (5..15).collect::<Vec<_>>());
    }

    #[test]
    fn test_window_without_bounds_returns_everything() {
        let page = PagedResult::from_window(vec![1, 2, 3], None, None);
        assert_eq!(page.total, 3);
        assert_eq!(page.items, vec![1, 2, 3]);
    }

    #[test]
    fn test_window_edges() {
        let zero_top = PagedResult::from_window(vec![1, 2, 3, 4], Some(0), Some(1));
        assert_eq!(zero_top.items, vec![2, 3, 4]);

        let past_end = PagedResult::from_window(vec![1, 2, 3], Some(2), Some(10));
        assert_eq!(past_end.total, 3);
        assert!(past_end.items.is_empty());

        let clamped = PagedResult::from_window(vec![1, 2, 3], Some(10), None);
        assert_eq!(clamped.items, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_follows_continuation_tokens_from_seed() {
        let mut server = Server::new_async().await;

        let first = server
            .mock("GET", "/org/proj/_apis/pipelines")
            .match_query(Matcher::Regex(r"^api-version=7\.1$".to_string()))
            .with_header("content-type", "application/json")
            .with_body(json!({"value": [{"id": 1}, {"id": 2}], "continuationToken": "tok1"}).to_string())
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/org/proj/_apis/pipelines")
            .match_query(Matcher::Regex(r"^api-version=7\.1&continuationToken=tok1$".to_string()))
            .with_body(json!({"value": [{"id": 3}]}).to_string())
            .with_header("x-ms-continuationtoken", "c")
            .expect(1)
            .create_async()
            .await;
        let third = server
            .mock("GET", "/org/proj/_apis/pipelines")
            .match_query(Matcher::Regex(r"^api-version=7\.1&continuationToken=c$".to_string()))
            .with_body(json!({"count": 0}).to_string())
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let seed = client.endpoint(&["pipelines"]);
        let items: Vec<Value> = client.fetch_all_paged(&seed, DEFAULT_ITEMS_KEY).await.unwrap();

        assert_eq!(items, vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]);
        first.assert_async().await;
        second.assert_async().await;
        third.assert_async().await;
    }

    #[tokio::test]
    async fn test_single_empty_page() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/org/proj/_apis/pipelines")
            .match_query(Matcher::Any)
            .with_body("{}")
            .create_async()
            .await;

        let client = client_for(&server);
        let seed = client.endpoint(&["pipelines"]);
        let items: Vec<Value> = client.fetch_all_paged(&seed, DEFAULT_ITEMS_KEY).await.unwrap();

        assert!(items.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_page_aborts() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/org/proj/_apis/pipelines")
            .match_query(Matcher::Regex(r"^api-version=7\.1$".to_string()))
            .with_body(json!({"value": [{"id": 1}], "continuationToken": "next"}).to_string())
            .create_async()
            .await;
        server
            .mock("GET", "/org/proj/_apis/pipelines")
            .match_query(Matcher::Regex("continuationToken=next".to_string()))
            .with_status(503)
            .with_body("try later")
            .create_async()
            .await;

        let client = client_for(&server);
        let seed = client.endpoint(&["pipelines"]);
        let result: Result<Vec<Value>> = client.fetch_all_paged(&seed, DEFAULT_ITEMS_KEY).await;

        match result {
            Err(ConnectorError::Api { status, message, .. }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "try later");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }
}
