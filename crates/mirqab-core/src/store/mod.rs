//! Storage abstraction for detection reports.
//!
//! The [`ReportStore`] trait defines every storage operation the Moraqib
//! pipeline and the service layer need, enabling pluggable backends
//! (SQLite in the service crate, in-memory here for tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! The store is treated as externally synchronized; the pipeline performs
//! no client-side locking around it.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{DetectionReport, NewReport, RetrievalFilter};

/// Aggregate counters over the whole store.
#[derive(Debug, Clone, Default)]
pub struct StoreStatistics {
    pub total_reports: i64,
    pub total_soldiers: i64,
    /// `(device_id, report count)` pairs, one per distinct device.
    pub reports_by_device: Vec<(String, i64)>,
}

/// Abstract report storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`save_report`](ReportStore::save_report) | Insert a report, allocating its id |
/// | [`get_report`](ReportStore::get_report) | Retrieve a single report by id |
/// | [`set_image_urls`](ReportStore::set_image_urls) | Attach stored snapshot URLs after insertion |
/// | [`query_reports`](ReportStore::query_reports) | Filter by time range and/or device, recency-ordered |
/// | [`search_reports`](ReportStore::search_reports) | Keyword match over the descriptive text fields |
/// | [`device_ids`](ReportStore::device_ids) | List distinct source devices |
/// | [`statistics`](ReportStore::statistics) | Aggregate counters |
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Insert a report and return the allocated `MIR-YYYYMMDD-NNNN` id.
    ///
    /// The sequence part is per calendar day of the report timestamp.
    /// Ids are never reassigned.
    async fn save_report(&self, report: &NewReport) -> Result<String>;

    /// Retrieve a single report by id.
    async fn get_report(&self, report_id: &str) -> Result<Option<DetectionReport>>;

    /// Attach snapshot URLs to an existing report. Image files are named
    /// after the allocated id, so they can only be stored after insert.
    /// Empty strings leave the corresponding field untouched.
    async fn set_image_urls(
        &self,
        report_id: &str,
        snapshot_url: &str,
        segmented_url: &str,
    ) -> Result<()>;

    /// Query reports matching the filter, newest first.
    ///
    /// An empty filter (`RetrievalFilter::recent`) returns the most
    /// recent reports up to the limit.
    async fn query_reports(&self, filter: &RetrievalFilter) -> Result<Vec<DetectionReport>>;

    /// Case-insensitive substring match of any whitespace-separated term
    /// in `keywords` against the environment, attire, and equipment
    /// fields, newest first.
    async fn search_reports(&self, keywords: &str, limit: i64) -> Result<Vec<DetectionReport>>;

    /// Distinct source device ids, sorted.
    async fn device_ids(&self) -> Result<Vec<String>>;

    /// Aggregate counters across all stored reports.
    async fn statistics(&self) -> Result<StoreStatistics>;
}
