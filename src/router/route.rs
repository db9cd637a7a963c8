use std::fmt;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::request::ConnectorRequest;
use crate::providers::azure::RunOptions;

/// Run state a caller PATCHes to request cancellation.
pub const CANCELING_STATE: &str = "canceling";

const TOP_ALIASES: &[&str] = &["top", "$top"];
const SKIP_ALIASES: &[&str] = &["skip", "$skip"];

/// Resource families addressed by the first path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resource {
    Pipelines,
    Builds,
    Repositories,
}

impl Resource {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "pipelines" => Some(Self::Pipelines),
            "builds" => Some(Self::Builds),
            "repositories" => Some(Self::Repositories),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Get,
    Post,
    Patch,
    Other,
}

impl From<&Method> for Verb {
    fn from(method: &Method) -> Self {
        match method.as_str().to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PATCH" => Self::Patch,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// Plain pipeline records.
    Simple,
    /// Pipelines with latest run, artifacts and commit subject.
    Enriched,
}

/// One client operation, fully parsed and validated.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Descriptor,
    ListPipelines {
        top: Option<usize>,
        skip: Option<usize>,
        mode: ListMode,
    },
    GetPipeline {
        pipeline_id: u64,
    },
    ListRuns {
        pipeline_id: u64,
        top: Option<usize>,
        skip: Option<usize>,
    },
    RunPipeline {
        pipeline_id: u64,
        options: RunOptions,
    },
    GetRun {
        pipeline_id: u64,
        run_id: u64,
    },
    CancelRun {
        pipeline_id: u64,
        run_id: u64,
    },
    AddRunTags {
        pipeline_id: u64,
        run_id: u64,
        tags: Vec<String>,
    },
    ListArtifacts {
        build_id: u64,
    },
    ListBranches {
        repository_id: String,
    },
    GetCommit {
        repository_id: String,
        commit_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdField {
    Pipeline,
    Run,
    Build,
}

impl fmt::Display for IdField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pipeline => "Pipeline",
            Self::Run => "Run",
            Self::Build => "Build",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("Not Found")]
    NotFound,

    #[error("Invalid {0} ID")]
    InvalidId(IdField),

    #[error("Invalid request body: {0}")]
    InvalidBody(String),
}

impl RouteError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InvalidId(_) | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TagsBody {
    #[serde(default)]
    tags: Vec<String>,
}

impl Route {
    /// Resolves a request to exactly one route.
    ///
    /// Unsupported methods on a known resource are reported as not found.
    pub fn parse(request: &ConnectorRequest) -> Result<Self, RouteError> {
        let segments: Vec<&str> = request.segments.iter().map(String::as_str).collect();

        let Some((first, rest)) = segments.split_first() else {
            return Ok(Self::Descriptor);
        };

        match Resource::from_segment(first) {
            Some(Resource::Pipelines) => Self::parse_pipelines(rest, request),
            Some(Resource::Builds) => Self::parse_builds(rest, request),
            Some(Resource::Repositories) => Self::parse_repositories(rest, request),
            None => Err(RouteError::NotFound),
        }
    }

    fn parse_pipelines(rest: &[&str], request: &ConnectorRequest) -> Result<Self, RouteError> {
        let verb = Verb::from(&request.method);

        let Some((id, tail)) = rest.split_first() else {
            if verb != Verb::Get {
                return Err(RouteError::NotFound);
            }
            let mode = match request.query_param("mode") {
                Some("simple") => ListMode::Simple,
                _ => ListMode::Enriched,
            };
            return Ok(Self::ListPipelines {
                top: query_number(request, TOP_ALIASES),
                skip: query_number(request, SKIP_ALIASES),
                mode,
            });
        };

        let pipeline_id = parse_id(id, IdField::Pipeline)?;

        match (tail, verb) {
            ([], Verb::Get) => Ok(Self::GetPipeline { pipeline_id }),
            (["runs"], Verb::Get) => Ok(Self::ListRuns {
                pipeline_id,
                top: query_number(request, TOP_ALIASES),
                skip: query_number(request, SKIP_ALIASES),
            }),
            (["runs"], Verb::Post) => Ok(Self::RunPipeline {
                pipeline_id,
                options: parse_body(request)?,
            }),
            (["runs", run_id, sub @ ..], _) => {
                let run_id = parse_id(run_id, IdField::Run)?;
                match (sub, verb) {
                    ([], Verb::Get) => Ok(Self::GetRun {
                        pipeline_id,
                        run_id,
                    }),
                    ([], Verb::Patch) if requests_cancel(request) => Ok(Self::CancelRun {
                        pipeline_id,
                        run_id,
                    }),
                    (["tags"], Verb::Post) => {
                        let body: TagsBody = parse_body(request)?;
                        Ok(Self::AddRunTags {
                            pipeline_id,
                            run_id,
                            tags: body.tags,
                        })
                    }
                    _ => Err(RouteError::NotFound),
                }
            }
            _ => Err(RouteError::NotFound),
        }
    }

    fn parse_builds(rest: &[&str], request: &ConnectorRequest) -> Result<Self, RouteError> {
        match rest {
            [id, "artifacts"] => {
                let build_id = parse_id(id, IdField::Build)?;
                match Verb::from(&request.method) {
                    Verb::Get => Ok(Self::ListArtifacts { build_id }),
                    _ => Err(RouteError::NotFound),
                }
            }
            _ => Err(RouteError::NotFound),
        }
    }

    fn parse_repositories(rest: &[&str], request: &ConnectorRequest) -> Result<Self, RouteError> {
        if Verb::from(&request.method) != Verb::Get {
            return Err(RouteError::NotFound);
        }

        match rest {
            [repository_id, "branches"] => Ok(Self::ListBranches {
                repository_id: repository_id.to_string(),
            }),
            [repository_id, "commits", commit_id] => Ok(Self::GetCommit {
                repository_id: repository_id.to_string(),
                commit_id: commit_id.to_string(),
            }),
            _ => Err(RouteError::NotFound),
        }
    }
}

fn parse_id(segment: &str, field: IdField) -> Result<u64, RouteError> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RouteError::InvalidId(field));
    }
    segment.parse().map_err(|_| RouteError::InvalidId(field))
}

/// Non-numeric values are ignored rather than rejected.
fn query_number(request: &ConnectorRequest, aliases: &[&str]) -> Option<usize> {
    request
        .query_alias(aliases)
        .and_then(|value| value.trim().parse().ok())
}

/// Reads the JSON body. A missing or syntactically invalid body is an empty
/// object; well-formed JSON of the wrong shape is a bad request.
fn body_value(request: &ConnectorRequest) -> Value {
    request
        .body
        .as_deref()
        .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
        .filter(|value| !value.is_null())
        .unwrap_or_else(|| Value::Object(Default::default()))
}

fn parse_body<T: DeserializeOwned>(request: &ConnectorRequest) -> Result<T, RouteError> {
    serde_json::from_value(body_value(request)).map_err(|e| RouteError::InvalidBody(e.to_string()))
}

fn requests_cancel(request: &ConnectorRequest) -> bool {
    body_value(request).get("state").and_then(Value::as_str) == Some(CANCELING_STATE)
}
