use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub connector: ConnectorConfig,
    pub azure: AzureConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Connector instance configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorConfig {
    /// Stable identifier of this integration instance; seeds the account entity key.
    pub instance_id: String,
    /// Human-readable instance name, used as the account display name.
    pub instance_name: String,
    /// SQLite file receiving job-state snapshots.
    pub db_path: PathBuf,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Azure tenant / subscription configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AzureConfig {
    pub directory_id: String,
    pub subscription_id: String,
    #[serde(default = "default_ingest_active_directory")]
    pub ingest_active_directory: bool,
    #[serde(default = "default_management_token_env")]
    pub management_token_env: String,
    #[serde(default = "default_graph_token_env")]
    pub graph_token_env: String,
}

/// API endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_management_endpoint")]
    pub management_endpoint: String,
    #[serde(default = "default_graph_endpoint")]
    pub graph_endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            management_endpoint: default_management_endpoint(),
            graph_endpoint: default_graph_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ingest_active_directory() -> bool {
    true
}

fn default_management_token_env() -> String {
    "AZURE_MANAGEMENT_TOKEN".to_string()
}

fn default_graph_token_env() -> String {
    "AZURE_GRAPH_TOKEN".to_string()
}

fn default_management_endpoint() -> String {
    "https://management.azure.com".to_string()
}

fn default_graph_endpoint() -> String {
    "https://graph.microsoft.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in AZGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("AZGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml_str(&config_str)
    }

    /// Parse and validate configuration from a TOML document
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.connector.instance_id.trim().is_empty() {
            anyhow::bail!("connector.instance_id must not be empty");
        }

        if self.azure.directory_id.trim().is_empty() {
            anyhow::bail!("azure.directory_id must not be empty");
        }

        if self.azure.subscription_id.trim().is_empty() {
            anyhow::bail!("azure.subscription_id must not be empty");
        }

        url::Url::parse(&self.api.management_endpoint).with_context(|| {
            format!(
                "api.management_endpoint is not a valid URL: {}",
                self.api.management_endpoint
            )
        })?;
        url::Url::parse(&self.api.graph_endpoint).with_context(|| {
            format!("api.graph_endpoint is not a valid URL: {}", self.api.graph_endpoint)
        })?;

        if self.api.timeout_secs == 0 {
            anyhow::bail!("api.timeout_secs must be greater than 0");
        }

        // Tokens are obtained out of band; only their presence is checked here.
        for var in [&self.azure.management_token_env, &self.azure.graph_token_env] {
            std::env::var(var).with_context(|| {
                format!(
                    "Environment variable {} not set. Set it in your .env file or as an environment variable with a bearer token.",
                    var
                )
            })?;
        }

        Ok(())
    }

    /// Read the management-plane bearer token from the environment
    pub fn management_token(&self) -> Result<String> {
        std::env::var(&self.azure.management_token_env)
            .with_context(|| format!("Environment variable {} not set", self.azure.management_token_env))
    }

    /// Read the Microsoft Graph bearer token from the environment
    pub fn graph_token(&self) -> Result<String> {
        std::env::var(&self.azure.graph_token_env)
            .with_context(|| format!("Environment variable {} not set", self.azure.graph_token_env))
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.connector.db_path
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.connector.migrations_dir
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }
}
