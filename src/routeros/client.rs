use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use std::fmt::Display;
use std::time::Duration;

use crate::models::RouterEndpoint;

use super::types::*;

const ACTIVE_SESSIONS_PATH: &str = "/rest/ppp/active";
const INTERFACES_PATH: &str = "/rest/interface";
const IP_ADDRESSES_PATH: &str = "/rest/ip/address";
const IDENTITY_PATH: &str = "/rest/system/identity";

/// Network, auth, timeout or decode failure while talking to a router
#[derive(Debug, Clone, thiserror::Error)]
#[error("router {endpoint} unreachable: {reason}")]
pub struct UnreachableRouter {
    pub endpoint: String,
    pub reason: String,
}

impl UnreachableRouter {
    pub fn new(endpoint: &RouterEndpoint, reason: impl Display) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Live reads from a router's management API
#[async_trait]
pub trait RouterApi: Send + Sync {
    /// Identities that currently hold an active session on the router
    async fn fetch_active_sessions(&self, endpoint: &RouterEndpoint) -> Result<HashSet<String>, UnreachableRouter>;

    /// Link state of every interface on the router
    async fn fetch_interface_status(&self, endpoint: &RouterEndpoint) -> Result<Vec<InterfaceStatus>, UnreachableRouter>;

    /// Every configured IP address and the interface carrying it
    async fn fetch_ip_addresses(&self, endpoint: &RouterEndpoint) -> Result<Vec<IpAddressEntry>, UnreachableRouter>;

    /// The router's own system identity name, if it has one
    async fn fetch_identity(&self, endpoint: &RouterEndpoint) -> Result<Option<String>, UnreachableRouter>;
}

/// RouterOS REST API client
pub struct RouterClient {
    client: Client,
}

impl RouterClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self { client })
    }

    /// Helper to perform an authenticated GET and decode the JSON body
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &RouterEndpoint,
        path: &str,
    ) -> Result<T, UnreachableRouter> {
        let resp = self
            .client
            .get(format!("{}{}", endpoint.base_url(), path))
            .basic_auth(&endpoint.username, Some(&endpoint.password))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| UnreachableRouter::new(endpoint, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(UnreachableRouter::new(
                endpoint,
                format!("HTTP {} from {}: {}", status, path, body.trim()),
            ));
        }

        resp.json()
            .await
            .map_err(|e| UnreachableRouter::new(endpoint, format!("invalid response from {}: {}", path, e)))
    }
}

#[async_trait]
impl RouterApi for RouterClient {
    async fn fetch_active_sessions(&self, endpoint: &RouterEndpoint) -> Result<HashSet<String>, UnreachableRouter> {
        let sessions: Vec<ActiveSession> = self.get_json(endpoint, ACTIVE_SESSIONS_PATH).await?;
        Ok(sessions.into_iter().map(|s| s.name).collect())
    }

    async fn fetch_interface_status(&self, endpoint: &RouterEndpoint) -> Result<Vec<InterfaceStatus>, UnreachableRouter> {
        self.get_json(endpoint, INTERFACES_PATH).await
    }

    async fn fetch_ip_addresses(&self, endpoint: &RouterEndpoint) -> Result<Vec<IpAddressEntry>, UnreachableRouter> {
        self.get_json(endpoint, IP_ADDRESSES_PATH).await
    }

    async fn fetch_identity(&self, endpoint: &RouterEndpoint) -> Result<Option<String>, UnreachableRouter> {
        let identity: SystemIdentity = self.get_json(endpoint, IDENTITY_PATH).await?;
        Ok(identity.name.filter(|n| !n.trim().is_empty()))
    }
}
