//! CLI commands for inspecting the report store and querying Moraqib
//! from the terminal.

use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;

use mirqab_core::models::RetrievalFilter;
use mirqab_core::rag::pipeline::{GenerationParams, MoraqibPipeline};
use mirqab_core::store::ReportStore;

use crate::config::Config;
use crate::db;
use crate::generation;
use crate::sqlite_store::SqliteReportStore;

/// Parse a `time_range` value: a number with an `h` or `d` suffix, or
/// `all` for no lower bound.
pub fn parse_time_range(value: &str) -> Result<Option<Duration>> {
    if value == "all" {
        return Ok(None);
    }
    let (number, unit) = value.split_at(value.len().saturating_sub(1));
    let n: i64 = number
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid time_range: '{}'", value))?;
    match unit {
        "h" => Ok(Some(Duration::hours(n))),
        "d" => Ok(Some(Duration::days(n))),
        _ => anyhow::bail!("invalid time_range: '{}'", value),
    }
}

pub async fn open_store(config: &Config) -> Result<Arc<SqliteReportStore>> {
    let pool = db::connect(config).await?;
    Ok(Arc::new(SqliteReportStore::new(pool)))
}

/// `mirqab query "<question>"` — run one question through the Moraqib
/// pipeline and print the answer with its provenance.
pub async fn run_query(config: &Config, question: &str) -> Result<()> {
    let store = open_store(config).await?;
    let generator = generation::create_generator(&config.generation)?;
    let pipeline = MoraqibPipeline::new(store, generator)
        .with_limit(config.retrieval.limit)
        .with_preview_ids(config.retrieval.preview_ids)
        .with_params(GenerationParams {
            temperature: config.generation.temperature,
            max_output_tokens: config.generation.max_output_tokens,
        });

    let result = pipeline.query(question).await;

    println!("{}", result.answer);
    println!();
    println!(
        "({} report(s) consulted{})",
        result.reports_count,
        if result.reports_used.is_empty() {
            String::new()
        } else {
            format!(": {}", result.reports_used.join(", "))
        }
    );

    Ok(())
}

/// `mirqab reports` — list recent reports in a table.
pub async fn run_reports(config: &Config, time_range: &str, limit: i64) -> Result<()> {
    let store = open_store(config).await?;

    let mut filter = RetrievalFilter::recent(limit);
    if let Some(duration) = parse_time_range(time_range)? {
        filter.start = Some(Utc::now() - duration);
    }

    let reports = store.query_reports(&filter).await?;
    if reports.is_empty() {
        println!("No detection reports in range '{}'.", time_range);
        return Ok(());
    }

    println!(
        "{:<20} {:<22} {:<12} {:>8}  ENVIRONMENT",
        "REPORT ID", "TIMESTAMP", "DEVICE", "SOLDIERS"
    );
    for r in &reports {
        println!(
            "{:<20} {:<22} {:<12} {:>8}  {}",
            r.report_id,
            r.timestamp.format("%Y-%m-%d %H:%M:%S"),
            r.source_device_id,
            r.soldier_count,
            r.environment,
        );
    }
    println!();
    println!("{} report(s).", reports.len());

    Ok(())
}

/// `mirqab stats` — aggregate counters over the whole store.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let stats = store.statistics().await?;

    println!("Total reports:  {}", stats.total_reports);
    println!("Total soldiers: {}", stats.total_soldiers);
    if !stats.reports_by_device.is_empty() {
        println!();
        println!("Reports by device:");
        for (device, count) in &stats.reports_by_device {
            println!("  {:<16} {}", device, count);
        }
    }

    Ok(())
}

/// `mirqab devices` — list distinct source devices.
pub async fn run_devices(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let devices = store.device_ids().await?;

    if devices.is_empty() {
        println!("No devices have reported yet.");
        return Ok(());
    }
    for device in devices {
        println!("{}", device);
    }

    Ok(())
}
