use std::collections::BTreeMap;

use futures::future::{join_all, try_join_all};
use log::{info, warn};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::core::AzureDevOpsClient;
use crate::error::Result;
use crate::providers::azure::types::Run;

/// Upstream build status written to cancel a run. Note the double "l":
/// the run state reported back while cancelling is spelled `canceling`.
pub const CANCELLING_STATUS: &str = "cancelling";

/// Options accepted when triggering a run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub template_parameters: Option<Map<String, Value>>,
    #[serde(default)]
    pub variables: Option<BTreeMap<String, VariableInput>>,
    #[serde(default)]
    pub resources: Option<Value>,
}

/// A run variable as supplied by callers: either a plain value or the full
/// upstream `{value, isSecret}` form.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum VariableInput {
    Plain(String),
    Detailed(Variable),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_secret: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<VariableInput> for Variable {
    fn from(input: VariableInput) -> Self {
        match input {
            VariableInput::Plain(value) => Self {
                value,
                is_secret: None,
                extra: Map::new(),
            },
            VariableInput::Detailed(variable) => variable,
        }
    }
}

/// Body of `POST pipelines/{id}/runs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_parameters: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<String, Variable>>,
}

impl RunRequest {
    pub fn from_options(options: RunOptions) -> Self {
        let mut resources = options.resources.filter(is_truthy);

        if let Some(branch) = options.branch.filter(|b| !b.is_empty()) {
            resources = Some(with_ref_name(resources, &branch));
        }

        let variables = options.variables.map(|variables| {
            variables
                .into_iter()
                .map(|(name, input)| (name, Variable::from(input)))
                .collect()
        });

        Self {
            resources,
            template_parameters: options.template_parameters,
            variables,
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Sets `repositories.self.refName`, keeping every other supplied key.
/// Non-object values on the way are replaced by objects.
fn with_ref_name(resources: Option<Value>, branch: &str) -> Value {
    let mut resources = match resources {
        Some(value @ Value::Object(_)) => value,
        _ => json!({}),
    };

    let repositories = &mut resources["repositories"];
    if !repositories.is_object() {
        *repositories = json!({});
    }
    let self_repository = &mut repositories["self"];
    if !self_repository.is_object() {
        *self_repository = json!({});
    }
    self_repository["refName"] = Value::String(branch.to_string());

    resources
}

impl AzureDevOpsClient {
    /// Triggers a run and, when tags are requested, labels it.
    ///
    /// Labelling is best-effort: failures are logged and the created run is
    /// returned regardless.
    pub async fn run_pipeline(&self, pipeline_id: u64, options: RunOptions) -> Result<Run> {
        let tags = options.tags.clone().unwrap_or_default();
        let request = RunRequest::from_options(options);
        let url = self.endpoint(&["pipelines", &pipeline_id.to_string(), "runs"]);

        let run: Run = self.send_json(Method::POST, url, &request).await?;
        info!(
            "Triggered run {:?} for pipeline {} ({})",
            run.id(),
            pipeline_id,
            run.state().unwrap_or("unknown state")
        );

        if tags.is_empty() {
            return Ok(run);
        }

        let Some(run_id) = run.id() else {
            warn!("Created run has no id; skipping {} tag(s)", tags.len());
            return Ok(run);
        };

        let outcomes = join_all(
            tags.iter()
                .map(|tag| self.add_run_label(pipeline_id, run_id, tag)),
        )
        .await;

        for (tag, outcome) in tags.iter().zip(outcomes) {
            if let Err(e) = outcome {
                warn!("Failed to add tag '{}' to run {}: {}", tag, run_id, e);
            }
        }

        Ok(run)
    }

    /// Adds every tag to a run concurrently. Fails if any label call fails.
    pub async fn add_run_tags(
        &self,
        pipeline_id: u64,
        run_id: u64,
        tags: &[String],
    ) -> Result<Vec<Value>> {
        try_join_all(
            tags.iter()
                .map(|tag| self.add_run_label(pipeline_id, run_id, tag)),
        )
        .await
    }

    async fn add_run_label(&self, pipeline_id: u64, run_id: u64, tag: &str) -> Result<Value> {
        let url = self.endpoint(&[
            "pipelines",
            &pipeline_id.to_string(),
            "runs",
            &run_id.to_string(),
            "labels",
        ]);
        self.send_json(Method::POST, url, &self.label_encoding.encode(tag))
            .await
    }

    /// Requests cancellation of a run through the builds API, where the run
    /// id doubles as the build id. The upstream record is returned untouched.
    pub async fn cancel_run(&self, pipeline_id: u64, run_id: u64) -> Result<Value> {
        info!("Cancelling run {} of pipeline {}", run_id, pipeline_id);

        let url = self.endpoint(&["build", "builds", &run_id.to_string()]);
        self.send_json(Method::PATCH, url, &json!({ "status": CANCELLING_STATUS }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectorError;
    use crate::providers::azure::client::{ClientConfig, LabelEncoding};
    use mockito::{Matcher, Server};

    fn client_for(server: &Server) -> AzureDevOpsClient {
        client_with_encoding(server, LabelEncoding::Object)
    }

    fn client_with_encoding(server: &Server, label_encoding: LabelEncoding) -> AzureDevOpsClient {
        let mut config = ClientConfig::new("org", "proj", "pat");
        config.base_url = Some(server.url());
        config.label_encoding = label_encoding;
        AzureDevOpsClient::new(config).unwrap()
    }

    fn options(value: Value) -> RunOptions {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_branch_only_request() {
        let request = RunRequest::from_options(options(json!({"branch": "refs/heads/main"})));

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"resources": {"repositories": {"self": {"refName": "refs/heads/main"}}}})
        );
    }

    #[test]
    fn test_branch_merges_into_supplied_resources() {
        let request = RunRequest::from_options(options(json!({
            "branch": "refs/heads/release",
            "resources": {
                "repositories": {
                    "self": {"version": "abc123"},
                    "tools": {"refName": "refs/heads/main"}
                },
                "pipelines": {"upstream": {"runId": 4}}
            }
        })));

        assert_eq!(
            request.resources,
            Some(json!({
                "repositories": {
                    "self": {"version": "abc123", "refName": "refs/heads/release"},
                    "tools": {"refName": "refs/heads/main"}
                },
                "pipelines": {"upstream": {"runId": 4}}
            }))
        );
    }

    #[test]
    fn test_variables_are_normalized() {
        let request = RunRequest::from_options(options(json!({
            "variables": {
                "plain": "1",
                "secret": {"value": "s3cr3t", "isSecret": true}
            },
            "templateParameters": {"env": "staging"}
        })));

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "templateParameters": {"env": "staging"},
                "variables": {
                    "plain": {"value": "1"},
                    "secret": {"value": "s3cr3t", "isSecret": true}
                }
            })
        );
    }

    #[test]
    fn test_empty_options_produce_empty_body() {
        let request = RunRequest::from_options(RunOptions::default());
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({}));

        let blank_branch = RunRequest::from_options(options(json!({"branch": ""})));
        assert_eq!(blank_branch.resources, None);
    }

    #[tokio::test]
    async fn test_run_pipeline_with_tags() {
        let mut server = Server::new_async().await;
        let trigger = server
            .mock("POST", "/org/proj/_apis/pipelines/7/runs")
            .match_query(Matcher::UrlEncoded("api-version".to_string(), "7.1".to_string()))
            .match_body(Matcher::Json(json!({
                "resources": {"repositories": {"self": {"refName": "refs/heads/main"}}}
            })))
            .with_status(200)
            .with_body(json!({"id": 55, "state": "inProgress"}).to_string())
            .expect(1)
            .create_async()
            .await;
        let labels = server
            .mock("POST", "/org/proj/_apis/pipelines/7/runs/55/labels")
            .match_query(Matcher::UrlEncoded("api-version".to_string(), "7.1".to_string()))
            .match_body(Matcher::Regex(r#"^\{"name":"(nightly|qa)"\}$"#.to_string()))
            .with_body(json!({"name": "ok"}).to_string())
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server);
        let run = client
            .run_pipeline(
                7,
                options(json!({"branch": "refs/heads/main", "tags": ["nightly", "qa"]})),
            )
            .await
            .unwrap();

        assert_eq!(run.id(), Some(55));
        trigger.assert_async().await;
        labels.assert_async().await;
    }

    #[tokio::test]
    async fn test_run_pipeline_tag_failure_is_not_fatal() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/org/proj/_apis/pipelines/7/runs")
            .match_query(Matcher::Any)
            .with_body(json!({"id": 56, "state": "inProgress"}).to_string())
            .create_async()
            .await;
        server
            .mock("POST", "/org/proj/_apis/pipelines/7/runs/56/labels")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body("bad label")
            .create_async()
            .await;

        let client = client_for(&server);
        let run = client
            .run_pipeline(7, options(json!({"tags": ["nightly"]})))
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_value(&run).unwrap(),
            json!({"id": 56, "state": "inProgress"})
        );
    }

    #[tokio::test]
    async fn test_add_run_tags_surfaces_failure() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/org/proj/_apis/pipelines/7/runs/56/labels")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body("bad label")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .add_run_tags(7, 56, &["nightly".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectorError::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_add_run_tags_bare_string_encoding() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/org/proj/_apis/pipelines/7/runs/56/labels")
            .match_query(Matcher::Any)
            .match_body(Matcher::Json(json!("nightly")))
            .with_body(json!("nightly").to_string())
            .expect(1)
            .create_async()
            .await;

        let client = client_with_encoding(&server, LabelEncoding::BareString);
        let created = client
            .add_run_tags(7, 56, &["nightly".to_string()])
            .await
            .unwrap();

        assert_eq!(created, vec![json!("nightly")]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_cancel_run_uses_builds_api() {
        let upstream = json!({"id": 3, "status": "cancelling", "result": null, "definition": {"id": 7}});

        let mut server = Server::new_async().await;
        let mock = server
            .mock("PATCH", "/org/proj/_apis/build/builds/3")
            .match_query(Matcher::UrlEncoded("api-version".to_string(), "7.1".to_string()))
            .match_body(Matcher::Json(json!({"status": "cancelling"})))
            .with_body(upstream.to_string())
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let record = client.cancel_run(7, 3).await.unwrap();

        assert_eq!(record, upstream);
        mock.assert_async().await;
    }
}
