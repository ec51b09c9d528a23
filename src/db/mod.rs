mod devices;
pub(crate) mod row_helpers;
mod wan_status;

use anyhow::{Context, Result};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::collections::HashMap;

use crate::models::*;

/// Typed "resource not found" error, downcast by the API error handler
#[derive(Debug)]
pub struct NotFoundError {
    pub resource: String,
    pub id: String,
}

impl NotFoundError {
    pub fn new(resource: &str, id: &str) -> Self {
        Self {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }
}

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} not found: {}", self.resource, self.id)
    }
}

impl std::error::Error for NotFoundError {}

/// Store handles all database operations, delegating to per-entity repo modules.
#[derive(Clone)]
pub struct Store {
    pool: Pool<Sqlite>,
}

impl Store {
    /// Create a new database store with a specific pool size
    pub async fn with_pool_size(db_path: &str, max_connections: u32) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&db_url)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Single-connection in-memory store; the database lives as long as the connection.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    #[cfg(test)]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    // ========== Device Directory ==========

    pub async fn list_devices(&self, scope: DeviceScope) -> Result<Vec<Device>> {
        devices::DeviceRepo::list(&self.pool, scope).await
    }

    /// Look up a device by its router identity; missing devices surface as `NotFoundError`
    pub async fn get_device(&self, device_id: &str) -> Result<Device> {
        devices::DeviceRepo::get(&self.pool, device_id)
            .await?
            .ok_or_else(|| NotFoundError::new("Device", device_id).into())
    }

    // ========== WAN Status History ==========

    pub async fn append_observation(&self, obs: &NewObservation) -> Result<InterfaceObservation> {
        wan_status::WanStatusRepo::append(&self.pool, obs).await
    }

    pub async fn latest_observation(&self, identity: &str, label: &str) -> Result<Option<InterfaceObservation>> {
        wan_status::WanStatusRepo::latest(&self.pool, identity, label).await
    }

    pub async fn latest_per_interface(&self, identity: &str) -> Result<LatestByLabel> {
        wan_status::WanStatusRepo::latest_per_interface(&self.pool, identity).await
    }

    pub async fn latest_per_interface_for(&self, identities: &[String]) -> Result<HashMap<String, LatestByLabel>> {
        wan_status::WanStatusRepo::latest_per_interface_for(&self.pool, identities).await
    }

    pub async fn observation_history(&self, identity: &str) -> Result<Vec<InterfaceObservation>> {
        wan_status::WanStatusRepo::history(&self.pool, identity).await
    }

    pub async fn list_observations(&self, limit: i32, offset: i32) -> Result<Vec<InterfaceObservation>> {
        wan_status::WanStatusRepo::list_paged(&self.pool, limit, offset).await
    }
}
