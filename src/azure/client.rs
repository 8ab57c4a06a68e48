use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::Config;
use crate::error::{ConnectorError, Result};

/// One page of an ARM or Graph listing. Records stay raw so each one can be
/// deserialized (and rejected) on its own.
#[derive(Deserialize)]
struct Page {
    #[serde(default)]
    value: Vec<Value>,
    #[serde(rename = "nextLink", default)]
    next_link: Option<String>,
    #[serde(rename = "@odata.nextLink", default)]
    odata_next_link: Option<String>,
}

/// Counters for one paginated listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IterationStats {
    pub pages: usize,
    pub records: usize,
    /// Records that failed to deserialize and were skipped
    pub skipped: usize,
}

impl IterationStats {
    pub fn absorb(&mut self, other: IterationStats) {
        self.pages += other.pages;
        self.records += other.records;
        self.skipped += other.skipped;
    }
}

/// Bearer-token client for the Azure management plane and Microsoft Graph
pub struct AzureClient {
    http: Client,
    management_endpoint: String,
    management_token: String,
    graph_endpoint: String,
    graph_token: String,
}

impl AzureClient {
    /// Build a client from validated configuration; tokens are read from the environment.
    pub fn new(config: &Config) -> Result<Self> {
        let management_token = config
            .management_token()
            .map_err(|e| ConnectorError::Config(e.to_string()))?;
        let graph_token = config
            .graph_token()
            .map_err(|e| ConnectorError::Config(e.to_string()))?;

        Self::with_endpoints(
            &config.api.management_endpoint,
            management_token,
            &config.api.graph_endpoint,
            graph_token,
            config.timeout(),
        )
    }

    /// Client against explicit endpoints, e.g. a local mock server.
    pub fn with_endpoints(
        management_endpoint: &str,
        management_token: impl Into<String>,
        graph_endpoint: &str,
        graph_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConnectorError::Api(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            management_endpoint: management_endpoint.trim_end_matches('/').to_string(),
            management_token: management_token.into(),
            graph_endpoint: graph_endpoint.trim_end_matches('/').to_string(),
            graph_token: graph_token.into(),
        })
    }

    /// Visit every record of an ARM listing such as
    /// `/subscriptions/{id}/providers/Microsoft.Network/virtualNetworks`.
    pub async fn iterate_management<T, F>(
        &self,
        path: &str,
        api_version: &str,
        visit: F,
    ) -> Result<IterationStats>
    where
        T: DeserializeOwned,
        F: FnMut(T) -> Result<()>,
    {
        let url = format!(
            "{}{}?api-version={}",
            self.management_endpoint, path, api_version
        );
        self.iterate(url, &self.management_token, visit).await
    }

    /// Visit every record of a Graph listing such as `/v1.0/users`.
    pub async fn iterate_graph<T, F>(&self, path: &str, visit: F) -> Result<IterationStats>
    where
        T: DeserializeOwned,
        F: FnMut(T) -> Result<()>,
    {
        let url = format!("{}{}", self.graph_endpoint, path);
        self.iterate(url, &self.graph_token, visit).await
    }

    /// Collect an ARM listing into memory.
    pub async fn list_management<T: DeserializeOwned>(
        &self,
        path: &str,
        api_version: &str,
    ) -> Result<(Vec<T>, IterationStats)> {
        let mut records = Vec::new();
        let stats = self
            .iterate_management(path, api_version, |record: T| {
                records.push(record);
                Ok(())
            })
            .await?;
        Ok((records, stats))
    }

    /// Collect a Graph listing into memory.
    pub async fn list_graph<T: DeserializeOwned>(&self, path: &str) -> Result<(Vec<T>, IterationStats)> {
        let mut records = Vec::new();
        let stats = self
            .iterate_graph(path, |record: T| {
                records.push(record);
                Ok(())
            })
            .await?;
        Ok((records, stats))
    }

    async fn iterate<T, F>(&self, first_url: String, token: &str, mut visit: F) -> Result<IterationStats>
    where
        T: DeserializeOwned,
        F: FnMut(T) -> Result<()>,
    {
        let mut stats = IterationStats::default();
        let mut next = Some(first_url);

        while let Some(url) = next.take() {
            let page = self.get_page(&url, token).await?;
            stats.pages += 1;

            for raw in page.value {
                match serde_json::from_value::<T>(raw) {
                    Ok(record) => {
                        stats.records += 1;
                        visit(record)?;
                    }
                    Err(e) => {
                        stats.skipped += 1;
                        log::warn!("Skipping malformed record from {}: {}", url, e);
                    }
                }
            }

            next = page.next_link.or(page.odata_next_link);
        }

        log::debug!(
            "Listed {} records ({} skipped) over {} pages",
            stats.records,
            stats.skipped,
            stats.pages
        );
        Ok(stats)
    }

    async fn get_page(&self, url: &str, token: &str) -> Result<Page> {
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ConnectorError::Api(format!("Network error for {}: {}", url, e)))?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(ConnectorError::Api(format!("{} {}: {}", status, url, body)));
        }

        response
            .json::<Page>()
            .await
            .map_err(|e| ConnectorError::Api(format!("Failed to parse page from {}: {}", url, e)))
    }
}
