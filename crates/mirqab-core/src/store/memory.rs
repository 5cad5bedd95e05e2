//! In-memory [`ReportStore`] implementation for testing.
//!
//! Uses a `Vec` behind `std::sync::RwLock` for thread safety. Keyword
//! search is a brute-force substring scan over the descriptive fields,
//! matching the semantics of the SQLite `LIKE` search in the service
//! crate.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    format_report_id, DetectionReport, NewReport, RetrievalFilter,
};

use super::{ReportStore, StoreStatistics};

/// In-memory store for tests and offline experiments.
pub struct InMemoryStore {
    reports: RwLock<Vec<DetectionReport>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            reports: RwLock::new(Vec::new()),
        }
    }

    /// Seed the store with pre-built reports, bypassing id allocation.
    /// Intended for tests that need specific ids or timestamps.
    pub fn with_reports(reports: Vec<DetectionReport>) -> Self {
        Self {
            reports: RwLock::new(reports),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_any_term(report: &DetectionReport, terms: &[String]) -> bool {
    let haystacks = [
        report.environment.to_lowercase(),
        report.attire_and_camouflage.to_lowercase(),
        report.equipment.to_lowercase(),
    ];
    terms
        .iter()
        .any(|term| haystacks.iter().any(|field| field.contains(term)))
}

#[async_trait]
impl ReportStore for InMemoryStore {
    async fn save_report(&self, report: &NewReport) -> Result<String> {
        let mut reports = self.reports.write().unwrap();

        let date = report.timestamp.date_naive();
        let prefix = format!("MIR-{}-", date.format("%Y%m%d"));
        let next_seq = reports
            .iter()
            .filter_map(|r| r.report_id.strip_prefix(&prefix))
            .filter_map(|seq| seq.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let report_id = format_report_id(date, next_seq);

        reports.push(DetectionReport {
            report_id: report_id.clone(),
            timestamp: report.timestamp,
            location: report.location,
            soldier_count: report.soldier_count,
            environment: report.environment.clone(),
            attire_and_camouflage: report.attire_and_camouflage.clone(),
            equipment: report.equipment.clone(),
            source_device_id: report.source_device_id.clone(),
            image_snapshot_url: report.image_snapshot_url.clone(),
            segmented_image_url: report.segmented_image_url.clone(),
            ai_summary: report.ai_summary.clone(),
        });

        Ok(report_id)
    }

    async fn get_report(&self, report_id: &str) -> Result<Option<DetectionReport>> {
        let reports = self.reports.read().unwrap();
        Ok(reports.iter().find(|r| r.report_id == report_id).cloned())
    }

    async fn set_image_urls(
        &self,
        report_id: &str,
        snapshot_url: &str,
        segmented_url: &str,
    ) -> Result<()> {
        let mut reports = self.reports.write().unwrap();
        let report = reports
            .iter_mut()
            .find(|r| r.report_id == report_id)
            .ok_or_else(|| anyhow::anyhow!("report not found: {}", report_id))?;
        if !snapshot_url.is_empty() {
            report.image_snapshot_url = snapshot_url.to_string();
        }
        if !segmented_url.is_empty() {
            report.segmented_image_url = segmented_url.to_string();
        }
        Ok(())
    }

    async fn query_reports(&self, filter: &RetrievalFilter) -> Result<Vec<DetectionReport>> {
        let reports = self.reports.read().unwrap();

        let mut matched: Vec<DetectionReport> = reports
            .iter()
            .filter(|r| filter.start.map_or(true, |start| r.timestamp >= start))
            .filter(|r| filter.end.map_or(true, |end| r.timestamp < end))
            .filter(|r| {
                filter
                    .device_id
                    .as_deref()
                    .map_or(true, |dev| r.source_device_id == dev)
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let start = (filter.offset.max(0) as usize).min(matched.len());
        let end = (start + filter.limit.max(0) as usize).min(matched.len());
        Ok(matched[start..end].to_vec())
    }

    async fn search_reports(&self, keywords: &str, limit: i64) -> Result<Vec<DetectionReport>> {
        let terms: Vec<String> = keywords
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let reports = self.reports.read().unwrap();
        let mut matched: Vec<DetectionReport> = reports
            .iter()
            .filter(|r| matches_any_term(r, &terms))
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matched.truncate(limit.max(0) as usize);
        Ok(matched)
    }

    async fn device_ids(&self) -> Result<Vec<String>> {
        let reports = self.reports.read().unwrap();
        let mut ids: Vec<String> = reports
            .iter()
            .map(|r| r.source_device_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn statistics(&self) -> Result<StoreStatistics> {
        let reports = self.reports.read().unwrap();

        let mut by_device: BTreeMap<String, i64> = BTreeMap::new();
        for r in reports.iter() {
            *by_device.entry(r.source_device_id.clone()).or_insert(0) += 1;
        }

        Ok(StoreStatistics {
            total_reports: reports.len() as i64,
            total_soldiers: reports.iter().map(|r| r.soldier_count as i64).sum(),
            reports_by_device: by_device.into_iter().collect(),
        })
    }
}
