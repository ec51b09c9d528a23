use serde::{Deserialize, Serialize};
use std::fmt;

use super::wan_status::WAN_LABELS;

/// Reachability record for a router's management API
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterEndpoint {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl RouterEndpoint {
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Base URL of the management API, without a trailing slash
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host.trim_end_matches('/'), self.port)
    }
}

// Credentials stay out of logs.
impl fmt::Debug for RouterEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl fmt::Display for RouterEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Device represents a managed gateway as stored by the admin console
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    /// Router-assigned identity, stable across reboots
    pub device_id: String,
    pub device_name: String,
    pub device_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<i64>,
    pub endpoint: RouterEndpoint,
    pub port_count: i64,
    pub email_ids: Vec<String>,
    pub telegram_ids: Vec<String>,
}

impl Device {
    /// WAN labels this device declares, WAN1 up to its port count
    pub fn wan_labels(&self) -> &'static [&'static str] {
        let declared = match self.port_count {
            n if n <= 0 => WAN_LABELS.len(),
            n => (n as usize).min(WAN_LABELS.len()),
        };
        &WAN_LABELS[..declared]
    }
}

/// Which slice of the fleet a query covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum DeviceScope {
    All,
    ByAdmin(i64),
    ByManager(i64),
    BySite(i64),
}

/// Scope selection as it arrives on a query string
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ScopeQuery {
    #[serde(default)]
    pub admin_id: Option<i64>,
    #[serde(default)]
    pub manager_id: Option<i64>,
    #[serde(default)]
    pub site_id: Option<i64>,
}

impl From<&ScopeQuery> for DeviceScope {
    fn from(q: &ScopeQuery) -> Self {
        if let Some(id) = q.admin_id {
            DeviceScope::ByAdmin(id)
        } else if let Some(id) = q.manager_id {
            DeviceScope::ByManager(id)
        } else if let Some(id) = q.site_id {
            DeviceScope::BySite(id)
        } else {
            DeviceScope::All
        }
    }
}

/// ProbeRouterRequest counts devices against an explicitly supplied router
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeRouterRequest {
    pub ip: String,
    #[serde(default = "default_router_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
}

fn default_router_port() -> u16 {
    80
}

impl From<ProbeRouterRequest> for RouterEndpoint {
    fn from(req: ProbeRouterRequest) -> Self {
        RouterEndpoint::new(req.ip, req.port, req.username, req.password)
    }
}
