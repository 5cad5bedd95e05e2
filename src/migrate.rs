use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the detection report schema. Every statement is idempotent, so
/// `init` can be re-run safely.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS detection_reports (
            report_id TEXT PRIMARY KEY,
            timestamp INTEGER NOT NULL,
            latitude REAL NOT NULL DEFAULT 0,
            longitude REAL NOT NULL DEFAULT 0,
            soldier_count INTEGER NOT NULL DEFAULT 0,
            environment TEXT NOT NULL DEFAULT 'Unknown',
            attire_and_camouflage TEXT NOT NULL DEFAULT 'Unknown',
            equipment TEXT NOT NULL DEFAULT 'Unknown',
            source_device_id TEXT NOT NULL DEFAULT 'Unknown',
            image_snapshot_url TEXT NOT NULL DEFAULT '',
            segmented_image_url TEXT NOT NULL DEFAULT '',
            ai_summary TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_reports_timestamp ON detection_reports(timestamp DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_reports_device ON detection_reports(source_device_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
