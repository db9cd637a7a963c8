use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use reqwest::Method;
use std::path::PathBuf;
use std::sync::Arc;

use ado_connector::providers::azure::AzureDevOpsClient;
use ado_connector::router::{ConnectorRequest, Router};

use crate::config::Config;
use crate::output;

#[derive(Parser)]
#[command(name = "ado-connector")]
#[command(author, version, about = "Azure DevOps pipelines connector", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./ado-connector.{toml,json,yaml,yml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, env = "ADO_ORG")]
    organization: Option<String>,

    #[arg(long, global = true, env = "ADO_PROJECT")]
    project: Option<String>,

    #[arg(long, global = true, env = "ADO_PAT", hide_env_values = true)]
    token: Option<String>,

    #[arg(long, global = true)]
    api_version: Option<String>,

    #[arg(long, global = true)]
    base_url: Option<String>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch one request through the connector router
    Request {
        /// HTTP method (GET, POST, PATCH)
        method: String,

        /// Path below the connector root, e.g. `pipelines/7/runs?top=5`
        #[arg(default_value = "")]
        path: String,

        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "query", value_parser = parse_key_value)]
        query: Vec<(String, String)>,

        /// JSON request body
        #[arg(short = 'd', long)]
        data: Option<String>,
    },
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;

        if let Some(organization) = &self.organization {
            config.azure.organization = Some(organization.clone());
        }
        if let Some(project) = &self.project {
            config.azure.project = Some(project.clone());
        }
        if let Some(token) = &self.token {
            config.azure.token = Some(token.clone());
        }
        if let Some(api_version) = &self.api_version {
            config.azure.api_version = api_version.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.azure.base_url = base_url.clone();
        }
        config.output.pretty |= self.pretty;

        Ok(config)
    }

    async fn execute_request(
        &self,
        method: &str,
        path: &str,
        query: &[(String, String)],
        data: Option<&str>,
    ) -> Result<i32> {
        let config = self.load_config()?;

        let client = AzureDevOpsClient::new(config.azure.client_config())
            .context("Failed to create Azure DevOps client")?;
        let router = Router::new(Arc::new(client));

        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .with_context(|| format!("Invalid HTTP method: {method}"))?;

        let (path, inline_query) = path.split_once('?').unwrap_or((path, ""));
        let mut request = ConnectorRequest::new(method, path);
        for (key, value) in url::form_urlencoded::parse(inline_query.as_bytes()) {
            request = request.with_query(key, value);
        }
        for (key, value) in query {
            request = request.with_query(key.as_str(), value.as_str());
        }
        if let Some(data) = data {
            request = request.with_body(data);
        }

        info!("Dispatching {} {}", request.method, request.path());

        let method_name = request.method.to_string();
        let request_path = request.path();
        let response = router.handle(request).await;

        output::print_status(&method_name, &request_path, &response);
        println!("{}", output::render(&response, config.output.pretty)?);

        Ok(if response.status.is_success() { 0 } else { 1 })
    }

    pub async fn execute(&self) -> Result<i32> {
        match &self.command {
            Commands::Request {
                method,
                path,
                query,
                data,
            } => {
                self.execute_request(method, path, query, data.as_deref())
                    .await
            }
        }
    }
}
