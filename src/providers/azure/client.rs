mod builds;
mod core;
mod git;
mod paging;
mod pipelines;
mod runs;

pub use self::core::{
    AzureDevOpsClient, ClientConfig, LabelEncoding, DEFAULT_API_VERSION, DEFAULT_BASE_URL,
    DEFAULT_MAX_CONCURRENT_REQUESTS,
};
pub use self::paging::PagedResult;
pub use self::runs::{RunOptions, RunRequest, Variable, VariableInput, CANCELLING_STATUS};
