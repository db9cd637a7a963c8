use anyhow::{Context, Result};
use ado_connector::providers::azure::{
    ClientConfig, LabelEncoding, DEFAULT_API_VERSION, DEFAULT_BASE_URL,
    DEFAULT_MAX_CONCURRENT_REQUESTS,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CANDIDATES: [&str; 4] = [
    "ado-connector.toml",
    "ado-connector.json",
    "ado-connector.yaml",
    "ado-connector.yml",
];

/// Configuration file structure for the connector.
///
/// Keeps connection settings out of the command line. Values given as flags
/// or environment variables take precedence over the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Azure DevOps connection settings
    #[serde(default)]
    pub azure: AzureConfig,

    /// Output format preferences
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AzureConfig {
    /// Organization name (e.g., 'contoso')
    pub organization: Option<String>,

    /// Project name within the organization
    pub project: Option<String>,

    /// Personal access token
    pub token: Option<String>,

    /// REST API version sent with every call
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Service base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Upper bound on in-flight upstream requests
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Wire shape of run label calls
    #[serde(default)]
    pub label_encoding: LabelEncoding,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            organization: None,
            project: None,
            token: None,
            api_version: default_api_version(),
            base_url: default_base_url(),
            max_concurrent_requests: default_max_concurrent_requests(),
            label_encoding: LabelEncoding::default(),
        }
    }
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_max_concurrent_requests() -> usize {
    DEFAULT_MAX_CONCURRENT_REQUESTS
}

impl AzureConfig {
    /// Converts to client settings. Missing credentials become empty strings
    /// and are rejected when the client is built.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(
            self.organization.clone().unwrap_or_default(),
            self.project.clone().unwrap_or_default(),
            self.token.clone().unwrap_or_default(),
        );
        config.api_version = Some(self.api_version.clone());
        config.base_url = Some(self.base_url.clone());
        config.max_concurrent_requests = Some(self.max_concurrent_requests);
        config.label_encoding = self.label_encoding;
        config
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./ado-connector.toml
    /// 3. ./ado-connector.json
    /// 4. ./ado-connector.yaml
    /// 5. ./ado-connector.yml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::discover(Path::new(".")),
        }
    }

    fn discover(dir: &Path) -> Result<Self> {
        let found: Option<PathBuf> = CANDIDATES
            .iter()
            .map(|candidate| dir.join(candidate))
            .find(|path| path.exists());

        match found {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => {
                // Try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .or_else(|_| serde_json::from_str(&contents))
                    .or_else(|_| serde_yaml::from_str(&contents))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.azure.base_url, "https://dev.azure.com");
        assert_eq!(config.azure.api_version, "7.1");
        assert_eq!(config.azure.max_concurrent_requests, 16);
        assert_eq!(config.azure.label_encoding, LabelEncoding::Object);
        assert!(!config.output.pretty);
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[azure]
organization = "contoso"
project = "Fabrikam Fiber"
token = "pat-from-file"
api-version = "7.0"
label-encoding = "bare-string"

[output]
pretty = true
"#;
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::load(Some(temp_file.path())).unwrap();
        assert_eq!(config.azure.organization.as_deref(), Some("contoso"));
        assert_eq!(config.azure.project.as_deref(), Some("Fabrikam Fiber"));
        assert_eq!(config.azure.token.as_deref(), Some("pat-from-file"));
        assert_eq!(config.azure.api_version, "7.0");
        assert_eq!(config.azure.base_url, "https://dev.azure.com");
        assert_eq!(config.azure.label_encoding, LabelEncoding::BareString);
        assert!(config.output.pretty);
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "azure": {
    "organization": "contoso",
    "base-url": "http://localhost:8080",
    "max-concurrent-requests": 4
  }
}"#;
        write!(temp_file, "{}", json_content).unwrap();

        let config = Config::load(Some(temp_file.path())).unwrap();
        assert_eq!(config.azure.base_url, "http://localhost:8080");
        assert_eq!(config.azure.max_concurrent_requests, 4);
        assert_eq!(config.azure.project, None);
    }

    #[test]
    fn test_load_yaml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        write!(temp_file, "azure:\n  project: web\noutput:\n  pretty: true\n").unwrap();

        let config = Config::load(Some(temp_file.path())).unwrap();
        assert_eq!(config.azure.project.as_deref(), Some("web"));
        assert!(config.output.pretty);
    }

    #[test]
    fn test_missing_explicit_path_is_an_error() {
        let result = Config::load(Some(Path::new("does-not-exist.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_discover_candidates() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(Config::discover(temp_dir.path()).unwrap().azure.organization.is_none());

        std::fs::write(
            temp_dir.path().join("ado-connector.yml"),
            "azure:\n  organization: from-yaml\n",
        )
        .unwrap();
        std::fs::write(
            temp_dir.path().join("ado-connector.toml"),
            "[azure]\norganization = \"from-toml\"\n",
        )
        .unwrap();

        let config = Config::discover(temp_dir.path()).unwrap();
        assert_eq!(config.azure.organization.as_deref(), Some("from-toml"));
    }

    #[test]
    fn test_client_config_conversion() {
        let azure = AzureConfig {
            organization: Some("contoso".to_string()),
            project: Some("web".to_string()),
            token: Some("pat".to_string()),
            ..AzureConfig::default()
        };

        let client = azure.client_config();
        assert_eq!(client.organization, "contoso");
        assert_eq!(client.api_version.as_deref(), Some("7.1"));
        assert_eq!(client.max_concurrent_requests, Some(16));
    }
}
