use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use url::Url;

use crate::auth::Token;
use crate::error::{ConnectorError, Result};

pub const DEFAULT_BASE_URL: &str = "https://dev.azure.com";
pub const DEFAULT_API_VERSION: &str = "7.1";
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 16;

/// Wire shape of a single run-label creation call.
///
/// The labels endpoint has been observed to accept a `{"name": tag}` object;
/// some deployments expect the bare JSON string instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabelEncoding {
    #[default]
    Object,
    BareString,
}

impl LabelEncoding {
    pub fn encode(self, tag: &str) -> Value {
        match self {
            Self::Object => json!({ "name": tag }),
            Self::BareString => Value::String(tag.to_string()),
        }
    }
}

/// Connection settings for one Azure DevOps project.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub organization: String,
    pub project: String,
    pub token: Token,
    pub api_version: Option<String>,
    pub base_url: Option<String>,
    pub max_concurrent_requests: Option<usize>,
    pub label_encoding: LabelEncoding,
}

impl ClientConfig {
    pub fn new(
        organization: impl Into<String>,
        project: impl Into<String>,
        token: impl Into<Token>,
    ) -> Self {
        Self {
            organization: organization.into(),
            project: project.into(),
            token: token.into(),
            api_version: None,
            base_url: None,
            max_concurrent_requests: None,
            label_encoding: LabelEncoding::default(),
        }
    }
}

/// Azure DevOps REST client scoped to one organization and project.
///
/// Holds no mutable state besides the request permit pool, so a single
/// instance can serve concurrent callers behind an `Arc`.
pub struct AzureDevOpsClient {
    pub(super) client: Client,
    pub(super) api_url: Url,
    pub(super) api_version: String,
    pub(super) token: Token,
    pub(super) label_encoding: LabelEncoding,
    semaphore: Semaphore,
}

impl AzureDevOpsClient {
    /// Creates a client for the project described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Config`] if organization, project or token is
    /// empty, or if the base URL cannot host API paths.
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.organization.trim().is_empty()
            || config.project.trim().is_empty()
            || config.token.is_blank()
        {
            return Err(ConnectorError::Config(
                "Missing Azure DevOps configuration (organization, project, or token)".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent(concat!("ado-connector/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| ConnectorError::Config(format!("Failed to create HTTP client: {e}")))?;

        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let mut api_url = Url::parse(base_url)
            .map_err(|e| ConnectorError::Config(format!("Invalid base URL: {e}")))?;

        api_url
            .path_segments_mut()
            .map_err(|()| ConnectorError::Config(format!("Base URL cannot be a base: {base_url}")))?
            .pop_if_empty()
            .extend([config.organization.trim(), config.project.trim(), "_apis"]);

        let api_version = config
            .api_version
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

        let permits = config
            .max_concurrent_requests
            .unwrap_or(DEFAULT_MAX_CONCURRENT_REQUESTS)
            .max(1);

        Ok(Self {
            client,
            api_url,
            api_version,
            token: config.token,
            label_encoding: config.label_encoding,
            semaphore: Semaphore::new(permits),
        })
    }

    /// Builds `<base>/<org>/<project>/_apis/<segments...>?api-version=<v>`.
    pub(super) fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.api_url.clone();
        // `new` rejects URLs that cannot be a base.
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        url
    }

    /// Performs one authenticated HTTP exchange and returns headers and raw body.
    ///
    /// A permit is held for the duration of the exchange, bounding the number of
    /// in-flight upstream calls across every fan-out sharing this client.
    pub(super) async fn exchange(&self, request: RequestBuilder) -> Result<(HeaderMap, Vec<u8>)> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ConnectorError::PoolClosed)?;

        let request = self.token.authorize(request).build()?;
        debug!("{} {}", request.method(), request.url());

        let response = self.client.execute(request).await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(ConnectorError::Api {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                message,
            });
        }

        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok((headers, body))
    }

    pub(super) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let (_, body) = self.exchange(self.client.get(url)).await?;
        decode(&body)
    }

    pub(super) async fn send_json<B, T>(&self, method: Method, url: Url, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (_, body) = self
            .exchange(self.client.request(method, url).json(body))
            .await?;
        decode(&body)
    }
}

/// Decodes a response body, treating an empty body as JSON `null`.
pub(super) fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_value(Value::Null)?);
    }
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new("my-org", "My Project", "pat")
    }

    #[test]
    fn test_missing_configuration_is_rejected() {
        for (org, project, token) in [("", "p", "t"), ("o", "", "t"), ("o", "p", ""), ("o", "p", "  ")] {
            let result = AzureDevOpsClient::new(ClientConfig::new(org, project, token));
            assert!(matches!(result, Err(ConnectorError::Config(_))));
        }
    }

    #[test]
    fn test_endpoint_layout() {
        let client = AzureDevOpsClient::new(config()).unwrap();
        let url = client.endpoint(&["pipelines", "7", "runs"]);

        assert_eq!(
            url.as_str(),
            "https://dev.azure.com/my-org/My%20Project/_apis/pipelines/7/runs?api-version=7.1"
        );
    }

    #[test]
    fn test_custom_base_url_and_api_version() {
        let mut config = config();
        config.base_url = Some("http://127.0.0.1:1234/".to_string());
        config.api_version = Some("7.0".to_string());

        let client = AzureDevOpsClient::new(config).unwrap();
        let url = client.endpoint(&["build", "builds", "42", "artifacts"]);

        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:1234/my-org/My%20Project/_apis/build/builds/42/artifacts?api-version=7.0"
        );
    }

    #[test]
    fn test_label_encoding() {
        assert_eq!(LabelEncoding::Object.encode("nightly"), json!({"name": "nightly"}));
        assert_eq!(LabelEncoding::BareString.encode("nightly"), json!("nightly"));
    }

    #[test]
    fn test_decode_empty_body() {
        let value: Value = decode(b"").unwrap();
        assert_eq!(value, Value::Null);

        let parsed: Value = decode(br#"{"id": 1}"#).unwrap();
        assert_eq!(parsed, json!({"id": 1}));
    }
}
