//! SQLite-backed implementation of [`ReportStore`].
//!
//! Timestamps are stored as integer epoch seconds so time-window filters
//! and the recency index compare numerically. Report ids are allocated
//! inside a transaction by scanning the highest existing id for the
//! report's calendar day.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use mirqab_core::models::{format_report_id, DetectionReport, GeoPoint, NewReport, RetrievalFilter};
use mirqab_core::store::{ReportStore, StoreStatistics};

pub struct SqliteReportStore {
    pool: SqlitePool,
}

impl SqliteReportStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_report(row: &sqlx::sqlite::SqliteRow) -> Result<DetectionReport> {
    let epoch: i64 = row.try_get("timestamp")?;
    let timestamp = DateTime::<Utc>::from_timestamp(epoch, 0)
        .ok_or_else(|| anyhow!("timestamp out of range: {}", epoch))?;
    let soldier_count: i64 = row.try_get("soldier_count")?;

    Ok(DetectionReport {
        report_id: row.try_get("report_id")?,
        timestamp,
        location: GeoPoint::new(row.try_get("latitude")?, row.try_get("longitude")?),
        soldier_count: soldier_count.clamp(0, u32::MAX as i64) as u32,
        environment: row.try_get("environment")?,
        attire_and_camouflage: row.try_get("attire_and_camouflage")?,
        equipment: row.try_get("equipment")?,
        source_device_id: row.try_get("source_device_id")?,
        image_snapshot_url: row.try_get("image_snapshot_url")?,
        segmented_image_url: row.try_get("segmented_image_url")?,
        ai_summary: row.try_get("ai_summary")?,
    })
}

#[async_trait]
impl ReportStore for SqliteReportStore {
    async fn save_report(&self, report: &NewReport) -> Result<String> {
        let mut tx = self.pool.begin().await?;

        // Allocate the next id for the report's calendar day. Ids are
        // zero-padded, so lexicographic DESC order is numeric order.
        let day = report.timestamp.date_naive();
        let prefix = format!("MIR-{}-%", day.format("%Y%m%d"));
        let last_id: Option<String> = sqlx::query_scalar(
            "SELECT report_id FROM detection_reports WHERE report_id LIKE ? \
             ORDER BY report_id DESC LIMIT 1",
        )
        .bind(&prefix)
        .fetch_optional(&mut *tx)
        .await?;

        let next_seq = last_id
            .as_deref()
            .and_then(|id| id.rsplit('-').next())
            .and_then(|seq| seq.parse::<u32>().ok())
            .map_or(1, |seq| seq + 1);
        let report_id = format_report_id(day, next_seq);

        let now = Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO detection_reports (
                report_id, timestamp, latitude, longitude, soldier_count,
                environment, attire_and_camouflage, equipment,
                source_device_id, image_snapshot_url, segmented_image_url,
                ai_summary, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&report_id)
        .bind(report.timestamp.timestamp())
        .bind(report.location.latitude)
        .bind(report.location.longitude)
        .bind(report.soldier_count as i64)
        .bind(&report.environment)
        .bind(&report.attire_and_camouflage)
        .bind(&report.equipment)
        .bind(&report.source_device_id)
        .bind(&report.image_snapshot_url)
        .bind(&report.segmented_image_url)
        .bind(&report.ai_summary)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(report_id)
    }

    async fn get_report(&self, report_id: &str) -> Result<Option<DetectionReport>> {
        let row = sqlx::query("SELECT * FROM detection_reports WHERE report_id = ?")
            .bind(report_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_report).transpose()
    }

    async fn set_image_urls(
        &self,
        report_id: &str,
        snapshot_url: &str,
        segmented_url: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE detection_reports SET
                image_snapshot_url = CASE WHEN ?2 = '' THEN image_snapshot_url ELSE ?2 END,
                segmented_image_url = CASE WHEN ?3 = '' THEN segmented_image_url ELSE ?3 END,
                updated_at = ?4
            WHERE report_id = ?1
            "#,
        )
        .bind(report_id)
        .bind(snapshot_url)
        .bind(segmented_url)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("report not found: {}", report_id));
        }
        Ok(())
    }

    async fn query_reports(&self, filter: &RetrievalFilter) -> Result<Vec<DetectionReport>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM detection_reports WHERE 1=1");

        // Half-open window: start inclusive, end exclusive.
        if let Some(start) = filter.start {
            qb.push(" AND timestamp >= ").push_bind(start.timestamp());
        }
        if let Some(end) = filter.end {
            qb.push(" AND timestamp < ").push_bind(end.timestamp());
        }
        if let Some(device) = &filter.device_id {
            qb.push(" AND source_device_id = ").push_bind(device);
        }

        qb.push(" ORDER BY timestamp DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_report).collect()
    }

    async fn search_reports(&self, keywords: &str, limit: i64) -> Result<Vec<DetectionReport>> {
        let terms: Vec<String> = keywords
            .split_whitespace()
            .map(|t| format!("%{}%", t.to_lowercase()))
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        // Any term matching any of the three descriptive fields.
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM detection_reports WHERE (");
        for (i, term) in terms.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push("lower(environment) LIKE ")
                .push_bind(term.clone())
                .push(" OR lower(attire_and_camouflage) LIKE ")
                .push_bind(term.clone())
                .push(" OR lower(equipment) LIKE ")
                .push_bind(term.clone());
        }
        qb.push(") ORDER BY timestamp DESC LIMIT ").push_bind(limit);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_report).collect()
    }

    async fn device_ids(&self) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar(
            "SELECT DISTINCT source_device_id FROM detection_reports ORDER BY source_device_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn statistics(&self) -> Result<StoreStatistics> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, COALESCE(SUM(soldier_count), 0) AS soldiers \
             FROM detection_reports",
        )
        .fetch_one(&self.pool)
        .await?;
        let total_reports: i64 = row.try_get("total")?;
        let total_soldiers: i64 = row.try_get("soldiers")?;

        let device_rows = sqlx::query(
            "SELECT source_device_id, COUNT(*) AS n FROM detection_reports \
             GROUP BY source_device_id ORDER BY source_device_id",
        )
        .fetch_all(&self.pool)
        .await?;
        let reports_by_device = device_rows
            .iter()
            .map(|r| Ok((r.try_get("source_device_id")?, r.try_get("n")?)))
            .collect::<Result<Vec<(String, i64)>>>()?;

        Ok(StoreStatistics {
            total_reports,
            total_soldiers,
            reports_by_device,
        })
    }
}
