pub mod azure;

pub use azure::{AzureDevOpsClient, ClientConfig};
