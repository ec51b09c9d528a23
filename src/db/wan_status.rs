use anyhow::{Context, Result};
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;

use crate::models::*;

use super::row_helpers::map_observation_row;

const SELECT_OBSERVATION: &str = r#"
    SELECT id, identity, label, status, since, recorded_at
    FROM wan_status
"#;

// SQLite caps bound parameters per statement
const IDENTITY_CHUNK: usize = 500;

// Newest row per (identity, label). Equal recorded_at resolves to the higher id.
const LATEST_FILTER: &str = r#"
    w.id = (
        SELECT w2.id FROM wan_status w2
        WHERE w2.identity = w.identity AND w2.label = w.label
        ORDER BY w2.recorded_at DESC, w2.id DESC
        LIMIT 1
    )
"#;

/// Append-only WAN status history
pub struct WanStatusRepo;

impl WanStatusRepo {
    pub async fn append(pool: &Pool<Sqlite>, obs: &NewObservation) -> Result<InterfaceObservation> {
        let result = sqlx::query(
            "INSERT INTO wan_status (identity, label, status, since, recorded_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&obs.identity)
        .bind(&obs.label)
        .bind(obs.status.as_str())
        .bind(obs.since)
        .bind(obs.recorded_at)
        .execute(pool)
        .await?;

        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_OBSERVATION))
            .bind(result.last_insert_rowid())
            .fetch_optional(pool)
            .await?;

        row.as_ref()
            .map(map_observation_row)
            .context("Observation not found after insert")
    }

    pub async fn latest(pool: &Pool<Sqlite>, identity: &str, label: &str) -> Result<Option<InterfaceObservation>> {
        let row = sqlx::query(&format!(
            "{} WHERE identity = ? AND label = ? ORDER BY recorded_at DESC, id DESC LIMIT 1",
            SELECT_OBSERVATION
        ))
        .bind(identity)
        .bind(label)
        .fetch_optional(pool)
        .await?;

        Ok(row.as_ref().map(map_observation_row))
    }

    pub async fn latest_per_interface(pool: &Pool<Sqlite>, identity: &str) -> Result<LatestByLabel> {
        let rows = sqlx::query(&format!(
            "SELECT w.id, w.identity, w.label, w.status, w.since, w.recorded_at FROM wan_status w WHERE w.identity = ? AND {}",
            LATEST_FILTER
        ))
        .bind(identity)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .iter()
            .map(map_observation_row)
            .map(|obs| (obs.label.clone(), obs))
            .collect())
    }

    /// Latest per interface for each listed identity; unlisted identities are never read
    pub async fn latest_per_interface_for(
        pool: &Pool<Sqlite>,
        identities: &[String],
    ) -> Result<HashMap<String, LatestByLabel>> {
        let mut latest: HashMap<String, LatestByLabel> = HashMap::new();
        for chunk in identities.chunks(IDENTITY_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT w.id, w.identity, w.label, w.status, w.since, w.recorded_at FROM wan_status w WHERE w.identity IN ({}) AND {}",
                placeholders, LATEST_FILTER
            );
            let mut query = sqlx::query(&sql);
            for identity in chunk {
                query = query.bind(identity);
            }
            let rows = query.fetch_all(pool).await?;

            for obs in rows.iter().map(map_observation_row) {
                latest
                    .entry(obs.identity.clone())
                    .or_default()
                    .insert(obs.label.clone(), obs);
            }
        }
        Ok(latest)
    }

    pub async fn history(pool: &Pool<Sqlite>, identity: &str) -> Result<Vec<InterfaceObservation>> {
        let rows = sqlx::query(&format!(
            "{} WHERE identity = ? ORDER BY recorded_at DESC, id DESC",
            SELECT_OBSERVATION
        ))
        .bind(identity)
        .fetch_all(pool)
        .await?;

        Ok(rows.iter().map(map_observation_row).collect())
    }

    pub async fn list_paged(pool: &Pool<Sqlite>, limit: i32, offset: i32) -> Result<Vec<InterfaceObservation>> {
        let rows = sqlx::query(&format!(
            "{} ORDER BY recorded_at DESC, id DESC LIMIT ? OFFSET ?",
            SELECT_OBSERVATION
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(rows.iter().map(map_observation_row).collect())
    }
}
