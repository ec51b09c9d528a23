use anyhow::Result;
use sqlx::{Pool, Sqlite};

use crate::models::*;

use super::row_helpers::map_device_row;

const SELECT_DEVICE: &str = r#"
    SELECT id, device_id, device_name, device_type, site_id, admin_id, manager_id,
           device_ip, device_port, device_username, device_password, port_count,
           email_ids, telegram_ids
    FROM devices
"#;

/// Device directory lookups. Writes belong to the admin console.
pub struct DeviceRepo;

impl DeviceRepo {
    pub async fn list(pool: &Pool<Sqlite>, scope: DeviceScope) -> Result<Vec<Device>> {
        let (filter, id) = match scope {
            DeviceScope::All => ("", None),
            DeviceScope::ByAdmin(id) => ("WHERE admin_id = ?", Some(id)),
            DeviceScope::ByManager(id) => ("WHERE manager_id = ?", Some(id)),
            DeviceScope::BySite(id) => ("WHERE site_id = ?", Some(id)),
        };
        let sql = format!("{} {} ORDER BY device_name, device_id", SELECT_DEVICE, filter);

        let mut query = sqlx::query(&sql);
        if let Some(id) = id {
            query = query.bind(id);
        }
        let rows = query.fetch_all(pool).await?;

        Ok(rows.iter().map(map_device_row).collect())
    }

    pub async fn get(pool: &Pool<Sqlite>, device_id: &str) -> Result<Option<Device>> {
        let row = sqlx::query(&format!("{} WHERE device_id = ?", SELECT_DEVICE))
            .bind(device_id)
            .fetch_optional(pool)
            .await?;

        Ok(row.as_ref().map(map_device_row))
    }
}
