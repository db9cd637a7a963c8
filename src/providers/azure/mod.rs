mod client;
mod enrichment;
mod types;

pub use client::{
    AzureDevOpsClient, ClientConfig, LabelEncoding, PagedResult, RunOptions, RunRequest, Variable,
    VariableInput, CANCELLING_STATUS, DEFAULT_API_VERSION, DEFAULT_BASE_URL,
    DEFAULT_MAX_CONCURRENT_REQUESTS,
};
pub use enrichment::{EnrichedPipeline, PipelineEntry};
pub use types::{Artifact, Branch, Commit, GitRef, Pipeline, Run};
