//! SQLite-backed [`ItemStore`].
//!
//! Relies on the `UNIQUE(content_hash)` constraint created by
//! [`run_migrations`](crate::migrate::run_migrations): the insert uses
//! `ON CONFLICT(content_hash) DO NOTHING` and reports whether a row landed.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::models::{Area, CanonicalItem};

use super::{AreaTally, ItemStore};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ItemStore for SqliteStore {
    async fn insert_if_absent(&self, item: &CanonicalItem) -> Result<bool> {
        let alternatives_json = serde_json::to_string(&item.alternatives)?;
        let asset_refs_json = serde_json::to_string(&item.asset_refs)?;
        let metadata_json = serde_json::to_string(&item.metadata)?;
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO items (content_hash, item_id, year, area, text, alternatives_json,
                               correct_answer, topic, estimated_difficulty, asset_refs_json,
                               dataset_version, metadata_json, imported_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(content_hash) DO NOTHING
            "#,
        )
        .bind(&item.content_hash)
        .bind(&item.item_id)
        .bind(item.year)
        .bind(item.area.code())
        .bind(&item.text)
        .bind(&alternatives_json)
        .bind(item.correct_answer.as_str())
        .bind(&item.topic)
        .bind(item.estimated_difficulty.as_str())
        .bind(&asset_refs_json)
        .bind(&item.dataset_version)
        .bind(&metadata_json)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert item {}", item.item_id))?;

        Ok(result.rows_affected() == 1)
    }

    async fn tally(&self) -> Result<Vec<AreaTally>> {
        let rows = sqlx::query(
            r#"
            SELECT year, area, COUNT(*) AS count
            FROM items
            GROUP BY year, area
            ORDER BY year, area
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let area: String = row.get("area");
                Ok(AreaTally {
                    year: row.get::<i64, _>("year") as i32,
                    area: area.parse::<Area>().map_err(|e| anyhow!(e))?,
                    count: row.get("count"),
                })
            })
            .collect()
    }
}
