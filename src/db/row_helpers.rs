use sqlx::{Row, sqlite::SqliteRow};

use crate::models::*;

/// A stored notification-target list that is neither a JSON array nor a JSON-encoded array
#[derive(Debug, thiserror::Error)]
#[error("malformed recipient list in column {column}: {reason}")]
pub struct MalformedRecipientList {
    pub column: &'static str,
    pub reason: String,
}

/// Parse a stored target list. Accepts a JSON array or a JSON string holding an
/// encoded array; non-string elements are dropped.
pub fn parse_target_list(column: &'static str, raw: &str) -> Result<Vec<String>, MalformedRecipientList> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let malformed = |reason: String| MalformedRecipientList { column, reason };

    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| malformed(e.to_string()))?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::String(inner) => match serde_json::from_str(&inner) {
            Ok(serde_json::Value::Array(items)) => items,
            Ok(_) => return Err(malformed("encoded value is not an array".to_string())),
            Err(e) => return Err(malformed(e.to_string())),
        },
        serde_json::Value::Null => return Ok(Vec::new()),
        other => return Err(malformed(format!("unexpected JSON type: {}", other))),
    };

    Ok(items
        .into_iter()
        .filter_map(|v| match v {
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect())
}

/// Parse-or-empty: a malformed list is logged and treated as no recipients
fn targets_or_empty(device_id: &str, column: &'static str, raw: Option<String>) -> Vec<String> {
    match parse_target_list(column, raw.as_deref().unwrap_or_default()) {
        Ok(list) => list,
        Err(e) => {
            tracing::warn!("Device {}: {}; treating as empty", device_id, e);
            Vec::new()
        }
    }
}

/// Map a SQLite row to a Device struct
pub fn map_device_row(row: &SqliteRow) -> Device {
    let device_id: String = row.get("device_id");
    let port: i64 = row.get("device_port");
    Device {
        id: row.get("id"),
        device_name: row.get("device_name"),
        device_type: row.get("device_type"),
        site_id: row.get("site_id"),
        admin_id: row.get("admin_id"),
        manager_id: row.get("manager_id"),
        endpoint: RouterEndpoint {
            host: row.get("device_ip"),
            port: u16::try_from(port).unwrap_or(80),
            username: row.get("device_username"),
            password: row.get("device_password"),
        },
        port_count: row.get("port_count"),
        email_ids: targets_or_empty(&device_id, "email_ids", row.get("email_ids")),
        telegram_ids: targets_or_empty(&device_id, "telegram_ids", row.get("telegram_ids")),
        device_id,
    }
}

/// Map a SQLite row to an InterfaceObservation struct
pub fn map_observation_row(row: &SqliteRow) -> InterfaceObservation {
    let status: String = row.get("status");
    InterfaceObservation {
        id: row.get("id"),
        identity: row.get("identity"),
        label: row.get("label"),
        // the CHECK constraint keeps this column to up/down
        status: status.parse().unwrap_or(WanStatus::Down),
        since: row.get("since"),
        recorded_at: row.get("recorded_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_native_array() {
        let list = parse_target_list("email_ids", r#"["a@example.com", "b@example.com"]"#).unwrap();
        assert_eq!(list, vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn test_parse_double_encoded_array() {
        let list = parse_target_list("telegram_ids", r#""[\"-1001\", \"42\"]""#).unwrap();
        assert_eq!(list, vec!["-1001", "42"]);
    }

    #[test]
    fn test_parse_drops_non_strings_and_blanks() {
        let list = parse_target_list("email_ids", r#"["a@example.com", 7, null, "  "]"#).unwrap();
        assert_eq!(list, vec!["a@example.com"]);
    }

    #[test]
    fn test_parse_empty_and_null() {
        assert!(parse_target_list("email_ids", "").unwrap().is_empty());
        assert!(parse_target_list("email_ids", "null").unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse_target_list("email_ids", "a@example.com").is_err());
        assert!(parse_target_list("email_ids", r#"{"to": "a@example.com"}"#).is_err());
        assert!(parse_target_list("email_ids", r#""not json""#).is_err());
    }

    #[test]
    fn test_targets_or_empty_recovers() {
        assert!(targets_or_empty("GW-1", "email_ids", Some("{broken".into())).is_empty());
        assert!(targets_or_empty("GW-1", "email_ids", None).is_empty());
    }
}
