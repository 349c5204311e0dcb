use anyhow::Result;
use sqlx::SqlitePool;

/// Creates the item store schema. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // content_hash is the dedup identity; the unique constraint is what
    // makes insert-if-absent atomic.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content_hash TEXT NOT NULL UNIQUE,
            item_id TEXT NOT NULL,
            year INTEGER NOT NULL,
            area TEXT NOT NULL,
            text TEXT NOT NULL,
            alternatives_json TEXT NOT NULL,
            correct_answer TEXT NOT NULL,
            topic TEXT NOT NULL,
            estimated_difficulty TEXT NOT NULL,
            asset_refs_json TEXT NOT NULL DEFAULT '[]',
            dataset_version TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            imported_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_year_area ON items(year, area)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_item_id ON items(item_id)")
        .execute(pool)
        .await?;

    Ok(())
}
