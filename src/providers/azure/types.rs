//! Wire types for the Azure DevOps pipelines, build and git APIs.
//!
//! Upstream records are kept as raw JSON and serialized back out unchanged,
//! nulls and unknown fields included. Accessors interpret only the fields the
//! connector reads, and a field of an unexpected shape reads as absent
//! instead of failing the whole record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reads an id sent either as a number or as a numeric string.
fn numeric_id(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn non_empty_str<'a>(value: Option<&'a Value>) -> Option<&'a str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Pipeline definition as returned by `_apis/pipelines`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pipeline(Value);

impl Pipeline {
    pub fn id(&self) -> Option<u64> {
        numeric_id(self.0.get("id"))
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// Browser link to the pipeline, if upstream supplied one.
    pub fn web_url(&self) -> Option<&str> {
        self.0.pointer("/_links/web/href").and_then(Value::as_str)
    }
}

impl From<Value> for Pipeline {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// A pipeline run. `state` and `result` are relayed as opaque strings
/// (`inProgress`, `canceling`, `completed`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Run(Value);

impl Run {
    pub fn id(&self) -> Option<u64> {
        numeric_id(self.0.get("id"))
    }

    pub fn state(&self) -> Option<&str> {
        self.0.get("state").and_then(Value::as_str)
    }

    /// Id of the build backing this run: `resources.build.id`, then the
    /// legacy `build.id`.
    pub fn build_id(&self) -> Option<u64> {
        numeric_id(self.0.pointer("/resources/build/id"))
            .or_else(|| numeric_id(self.0.pointer("/build/id")))
    }

    /// Repository id and commit of the `self` repository resource, when both are known.
    pub fn source_commit(&self) -> Option<(&str, &str)> {
        let repo = self.0.pointer("/resources/repositories/self")?;
        let repository_id = non_empty_str(repo.pointer("/repository/id"))?;
        let version = non_empty_str(repo.get("version"))?;
        Some((repository_id, version))
    }
}

impl From<Value> for Run {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Build artifact as returned by `_apis/build/builds/{id}/artifacts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Artifact(Value);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Commit(Value);

impl Commit {
    /// First line of the commit message (empty when there is no message).
    pub fn subject(&self) -> String {
        self.0
            .get("comment")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .split('\n')
            .next()
            .unwrap_or_default()
            .trim_end_matches('\r')
            .to_string()
    }
}

/// Git ref entry from `_apis/git/repositories/{id}/refs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitRef {
    #[serde(default)]
    pub name: Option<String>,
}

const HEADS_PREFIX: &str = "refs/heads/";

/// Branch with a display name and the fully-qualified ref used for API calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    #[serde(rename = "ref")]
    pub ref_: String,
}

impl Branch {
    /// Builds a branch from a ref; nameless refs are skipped.
    pub fn from_ref(git_ref: GitRef) -> Option<Self> {
        let ref_ = git_ref.name?;
        let name = ref_.strip_prefix(HEADS_PREFIX).unwrap_or(&ref_).to_string();
        Some(Self { name, ref_ })
    }
}
