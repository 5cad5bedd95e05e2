//! Core data models used throughout Mirqab.
//!
//! These types represent the detection reports that flow through the
//! ingestion and retrieval pipeline, plus the filters and results the
//! Moraqib query assistant works with.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel used for descriptive fields when the analysis could not
/// determine a value.
pub const UNKNOWN: &str = "Unknown";

/// A latitude/longitude pair. `(0.0, 0.0)` is the placeholder for an
/// unknown capture location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Placeholder location for reports captured without GPS data.
    pub fn unknown() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }
}

/// Dashboard severity derived from the detected soldier count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        }
    }
}

/// A confirmed camouflaged-personnel detection stored in the report store.
///
/// Reports are only created for confirmed detections (`soldier_count > 0`),
/// but consumers must not rely on that — an empty or all-irrelevant result
/// set is always possible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    /// Store-allocated, human-sortable id (`MIR-YYYYMMDD-NNNN`).
    pub report_id: String,
    /// When the detection occurred. Not guaranteed to match creation
    /// order; reports can be backfilled.
    pub timestamp: DateTime<Utc>,
    pub location: GeoPoint,
    pub soldier_count: u32,
    pub environment: String,
    pub attire_and_camouflage: String,
    pub equipment: String,
    pub source_device_id: String,
    /// Opaque reference to the stored snapshot; never dereferenced here.
    pub image_snapshot_url: String,
    /// Opaque reference to the stored segmentation overlay.
    pub segmented_image_url: String,
    pub ai_summary: String,
}

impl DetectionReport {
    /// Severity bands used by the dashboard: three or more soldiers is
    /// High, two is Medium, anything else Low.
    pub fn severity(&self) -> Severity {
        match self.soldier_count {
            n if n >= 3 => Severity::High,
            2 => Severity::Medium,
            _ => Severity::Low,
        }
    }
}

/// A report as submitted for insertion, before the store allocates its id.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub timestamp: DateTime<Utc>,
    pub location: GeoPoint,
    pub soldier_count: u32,
    pub environment: String,
    pub attire_and_camouflage: String,
    pub equipment: String,
    pub source_device_id: String,
    pub image_snapshot_url: String,
    pub segmented_image_url: String,
    pub ai_summary: String,
}

impl NewReport {
    /// A report with every descriptive field at its sentinel value.
    pub fn unknown(timestamp: DateTime<Utc>, source_device_id: impl Into<String>) -> Self {
        Self {
            timestamp,
            location: GeoPoint::unknown(),
            soldier_count: 0,
            environment: UNKNOWN.to_string(),
            attire_and_camouflage: UNKNOWN.to_string(),
            equipment: UNKNOWN.to_string(),
            source_device_id: source_device_id.into(),
            image_snapshot_url: String::new(),
            segmented_image_url: String::new(),
            ai_summary: String::new(),
        }
    }
}

/// Format a report id for the given calendar day and per-day sequence.
///
/// Ids sort lexicographically in (date, sequence) order, which keeps the
/// store's id allocation a single prefix scan.
pub fn format_report_id(date: NaiveDate, sequence: u32) -> String {
    format!("MIR-{}-{:04}", date.format("%Y%m%d"), sequence)
}

/// Per-query retrieval filter built by the Moraqib classifier.
///
/// At most one strategy populates the time bounds or keyword path; the
/// device id may compose with any of them.
#[derive(Debug, Clone, Default)]
pub struct RetrievalFilter {
    /// Inclusive lower timestamp bound.
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper timestamp bound.
    pub end: Option<DateTime<Utc>>,
    /// Exact match on `source_device_id`.
    pub device_id: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl RetrievalFilter {
    /// Unfiltered recency-ordered retrieval, the degenerate case every
    /// store must support.
    pub fn recent(limit: i64) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>, limit: i64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            limit,
            ..Default::default()
        }
    }

    pub fn with_device(mut self, device_id: Option<String>) -> Self {
        self.device_id = device_id;
        self
    }
}

/// The structured outcome of one Moraqib query, returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub success: bool,
    /// Echo of the user's question.
    pub question: String,
    pub answer: String,
    /// Number of reports consulted for the answer.
    pub reports_count: usize,
    /// Ids of the reports surfaced in context, truncated to a preview.
    pub reports_used: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
