use serde::{Deserialize, Deserializer, Serialize};

/// Entry from the router's active PPP session listing
#[derive(Debug, Clone, Deserialize)]
pub struct ActiveSession {
    pub name: String,
}

/// Interface row from the router's interface listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceStatus {
    pub name: String,
    /// Operator comment; WAN uplinks are tagged "WAN1".."WAN4"
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, deserialize_with = "bool_or_string")]
    pub running: bool,
}

/// Row from the router's IP address table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAddressEntry {
    /// CIDR form, e.g. "203.0.113.7/30"
    pub address: String,
    pub interface: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemIdentity {
    #[serde(default)]
    pub name: Option<String>,
}

/// RouterOS REST returns booleans as "true"/"false" strings
fn bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Text(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes"),
    })
}
