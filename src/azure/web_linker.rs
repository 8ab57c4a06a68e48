use serde_json::Value;

use crate::jobstate::JobState;

/// Data key under which the account step stores the account entity's data.
pub const ACCOUNT_DATA_KEY: &str = "azure_account";

/// Builds Azure portal deep links for ingested resources.
#[derive(Debug, Clone, Default)]
pub struct AzureWebLinker {
    default_domain: Option<String>,
}

impl AzureWebLinker {
    pub fn new(default_domain: Option<String>) -> Self {
        Self { default_domain }
    }

    /// Linker for the tenant recorded by the account step, if it ran.
    pub fn from_job_state(state: &dyn JobState) -> Self {
        let default_domain = state
            .get_data(ACCOUNT_DATA_KEY)
            .and_then(|account| account.get("defaultDomain"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Self::new(default_domain)
    }

    pub fn default_domain(&self) -> Option<&str> {
        self.default_domain.as_deref()
    }

    /// `https://portal.azure.com/#@{domain}/resource{path}`; `None` without a default domain.
    pub fn portal_resource_url(&self, path: &str) -> Option<String> {
        let domain = self.default_domain.as_deref()?;
        Some(format!("https://portal.azure.com/#@{}/resource{}", domain, path))
    }
}
