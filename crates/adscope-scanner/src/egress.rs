//! Public egress address lookup, recorded at the start and end of a scrape.

use crate::error::Result;
use adscope_core::EgressConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

/// Best-effort lookup of the public address traffic leaves from.
#[async_trait]
pub trait EgressResolver: Send + Sync {
    /// Never fails; errors are reported in the returned string.
    async fn current_ip(&self) -> String;
}

#[derive(Debug, Deserialize)]
struct IpifyResponse {
    ip: String,
}

/// Resolver backed by an ipify-compatible JSON endpoint.
pub struct IpifyResolver {
    client: Client,
    url: String,
}

impl IpifyResolver {
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: &EgressConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            url: config.lookup_url.clone(),
        })
    }

    async fn lookup(&self) -> reqwest::Result<String> {
        let response: IpifyResponse = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.ip)
    }
}

#[async_trait]
impl EgressResolver for IpifyResolver {
    async fn current_ip(&self) -> String {
        match self.lookup().await {
            Ok(ip) => ip,
            Err(e) => {
                tracing::warn!(url = %self.url, "egress lookup failed: {}", e);
                format!("Error getting IP: {e}")
            }
        }
    }
}

/// Used when egress lookups are turned off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledEgress;

#[async_trait]
impl EgressResolver for DisabledEgress {
    async fn current_ip(&self) -> String {
        "unknown".to_string()
    }
}

/// Resolver selected by configuration.
///
/// # Errors
/// Returns error if the HTTP client cannot be created.
pub fn from_config(config: &EgressConfig) -> Result<Arc<dyn EgressResolver>> {
    if config.enabled {
        Ok(Arc::new(IpifyResolver::new(config)?))
    } else {
        Ok(Arc::new(DisabledEgress))
    }
}
