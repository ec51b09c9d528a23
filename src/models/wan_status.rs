use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Uplink labels a gateway may carry, in declaration order
pub const WAN_LABELS: [&str; 4] = ["WAN1", "WAN2", "WAN3", "WAN4"];

/// Link state reported for a single WAN interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WanStatus {
    Up,
    Down,
}

impl WanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WanStatus::Up => "up",
            WanStatus::Down => "down",
        }
    }
}

impl fmt::Display for WanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WanStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(WanStatus::Up),
            "down" => Ok(WanStatus::Down),
            other => Err(anyhow::anyhow!("invalid WAN status '{}': expected up or down", other)),
        }
    }
}

/// One recorded status sample for a WAN interface. Never updated once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceObservation {
    pub id: i64,
    pub identity: String,
    pub label: String,
    pub status: WanStatus,
    pub since: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

/// Observation waiting to be appended
#[derive(Debug, Clone)]
pub struct NewObservation {
    pub identity: String,
    pub label: String,
    pub status: WanStatus,
    pub since: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

/// Latest observation per interface label for one device
pub type LatestByLabel = BTreeMap<String, InterfaceObservation>;

/// StatusReport is the push payload sent by routers when a WAN flaps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub identity: String,
    /// Interface comment, i.e. the WAN label
    pub comment: String,
    pub status: String,
    pub since: String,
}

impl StatusReport {
    /// Validate the raw payload into a typed transition candidate
    pub fn parse(&self) -> anyhow::Result<WanReport> {
        let identity = self.identity.trim();
        if identity.is_empty() || self.comment.trim().is_empty() {
            anyhow::bail!("identity and comment are required");
        }
        Ok(WanReport {
            identity: identity.to_string(),
            label: canonical_label(&self.comment)?.to_string(),
            status: self.status.parse()?,
            since: parse_since(&self.since)?,
        })
    }
}

/// Map a router comment onto one of `WAN_LABELS`, ignoring case and surrounding blanks
pub fn canonical_label(raw: &str) -> anyhow::Result<&'static str> {
    let wanted = raw.trim();
    WAN_LABELS
        .iter()
        .copied()
        .find(|label| label.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| anyhow::anyhow!("invalid WAN label '{}': expected one of {}", wanted, WAN_LABELS.join(", ")))
}

/// Typed status report for a single (identity, label) key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WanReport {
    pub identity: String,
    pub label: String,
    pub status: WanStatus,
    pub since: DateTime<Utc>,
}

/// Parse a router-supplied timestamp. RFC 3339, or a bare `YYYY-MM-DD HH:MM:SS` taken as UTC.
pub fn parse_since(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    anyhow::bail!("invalid since timestamp '{}'", raw)
}

/// Aggregate health of a device for one poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Online,
    Partial,
    Offline,
}

/// Classification result for one device, with the per-label detail behind it
#[derive(Debug, Clone, Serialize)]
pub struct DeviceHealth {
    pub device_id: String,
    pub device_name: String,
    pub health: Health,
    pub wan: BTreeMap<String, WanStatus>,
    /// Address held by each running uplink; only filled by live checks
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub addresses: BTreeMap<String, String>,
    /// Name the router reports for itself; only filled by single-device inspection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub router_identity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Online/offline/partial tallies for a scope
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub online: usize,
    pub offline: usize,
    pub partial: usize,
}

impl StatusCounts {
    pub fn record(&mut self, health: Health) {
        match health {
            Health::Online => self.online += 1,
            Health::Partial => self.partial += 1,
            Health::Offline => self.offline += 1,
        }
    }

    pub fn tally<'a>(devices: impl IntoIterator<Item = &'a DeviceHealth>) -> Self {
        let mut counts = Self::default();
        for d in devices {
            counts.record(d.health);
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.online + self.offline + self.partial
    }
}

/// Result of one sweep over a scope
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub polled_at: DateTime<Utc>,
    pub counts: StatusCounts,
    pub devices: Vec<DeviceHealth>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_wan_status_parse() {
        assert_eq!("up".parse::<WanStatus>().unwrap(), WanStatus::Up);
        assert_eq!(" DOWN ".parse::<WanStatus>().unwrap(), WanStatus::Down);
        assert!("flapping".parse::<WanStatus>().is_err());
    }

    #[test]
    fn test_parse_since_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap();
        assert_eq!(parse_since("2024-03-01T10:15:00Z").unwrap(), expected);
        assert_eq!(parse_since("2024-03-01T15:45:00+05:30").unwrap(), expected);
        assert_eq!(parse_since("2024-03-01 10:15:00").unwrap(), expected);
        assert!(parse_since("yesterday").is_err());
    }

    #[test]
    fn test_report_requires_identity_and_label() {
        let report = StatusReport {
            identity: "  ".into(),
            comment: "WAN1".into(),
            status: "up".into(),
            since: "2024-03-01T10:15:00Z".into(),
        };
        assert!(report.parse().is_err());

        let report = StatusReport { identity: "GW-1".into(), ..report };
        let parsed = report.parse().unwrap();
        assert_eq!(parsed.identity, "GW-1");
        assert_eq!(parsed.label, "WAN1");
        assert_eq!(parsed.status, WanStatus::Up);
    }

    #[test]
    fn test_report_label_is_canonical() {
        let report = StatusReport {
            identity: "GW-1".into(),
            comment: " wan1 ".into(),
            status: "DOWN".into(),
            since: "2024-03-01T10:15:00Z".into(),
        };
        let parsed = report.parse().unwrap();
        assert_eq!(parsed.label, "WAN1");
        assert_eq!(parsed.status, WanStatus::Down);

        for bad in ["WAN5", "LTE", "WAN 1"] {
            let report = StatusReport { comment: bad.into(), ..report.clone() };
            assert!(report.parse().is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_counts_tally() {
        let mk = |health| DeviceHealth {
            device_id: "x".into(),
            device_name: "x".into(),
            health,
            wan: BTreeMap::new(),
            addresses: BTreeMap::new(),
            router_identity: None,
            reason: None,
        };
        let devices = vec![mk(Health::Online), mk(Health::Partial), mk(Health::Offline), mk(Health::Offline)];
        let counts = StatusCounts::tally(&devices);
        assert_eq!(counts, StatusCounts { online: 1, offline: 2, partial: 1 });
        assert_eq!(counts.total(), 4);
    }
}
