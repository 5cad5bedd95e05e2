//! Mirqab HTTP API server.
//!
//! Exposes report ingestion, dashboard queries, and the Moraqib RAG
//! assistant over a JSON HTTP API for the operations console and the
//! field devices.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (version, generation reachability) |
//! | `POST` | `/api/moraqib_query` | Natural-language question over stored reports |
//! | `POST` | `/api/report_detection` | Device report ingestion (API-key gated) |
//! | `GET`  | `/api/detection-reports` | Dashboard report listing with SOC fields |
//! | `GET`  | `/api/detection-stats` | KPI statistics for a time range |
//! | `GET`  | `/storage/{file}` | Stored detection snapshots |
//!
//! # Error Contract
//!
//! Error responses carry a machine-readable code and a human-readable
//! message:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted: the dashboard is a
//! browser client served from a different origin.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use mirqab_core::models::{GeoPoint, NewReport, RetrievalFilter, Severity, UNKNOWN};
use mirqab_core::rag::pipeline::{GenerationParams, Generator, MoraqibPipeline};
use mirqab_core::store::ReportStore;

use crate::config::Config;
use crate::generation::{self, GeminiGenerator};
use crate::storage::LocalStorage;

/// Shared application state passed to all route handlers via Axum's
/// `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<dyn ReportStore>,
    pipeline: Arc<MoraqibPipeline>,
    storage: Arc<LocalStorage>,
    /// Kept separately from the pipeline's generator for the health
    /// probe. `None` when generation is disabled.
    gemini: Option<Arc<GeminiGenerator>>,
}

/// Starts the Mirqab API server.
///
/// Binds to the address configured in `[server].bind` and runs until the
/// process is terminated.
pub async fn run_server(config: &Config, store: Arc<dyn ReportStore>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let config = Arc::new(config.clone());

    let gemini = if config.generation.is_enabled() {
        Some(Arc::new(GeminiGenerator::new(&config.generation)?))
    } else {
        None
    };
    let generator: Arc<dyn Generator> = match &gemini {
        Some(g) => g.clone(),
        None => Arc::new(generation::DisabledGenerator),
    };

    let pipeline = Arc::new(
        MoraqibPipeline::new(store.clone(), generator)
            .with_limit(config.retrieval.limit)
            .with_preview_ids(config.retrieval.preview_ids)
            .with_params(GenerationParams {
                temperature: config.generation.temperature,
                max_output_tokens: config.generation.max_output_tokens,
            }),
    );

    let storage = Arc::new(LocalStorage::new(config.storage.root.clone())?);
    let storage_dir = storage.root().to_path_buf();

    let state = AppState {
        config,
        store,
        pipeline,
        storage,
        gemini,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/api/moraqib_query", post(handle_moraqib_query))
        .route("/api/report_detection", post(handle_report_detection))
        .route("/api/detection-reports", get(handle_detection_reports))
        .route("/api/detection-stats", get(handle_detection_stats))
        .nest_service("/storage", ServeDir::new(storage_dir))
        .layer(cors)
        .with_state(state);

    tracing::info!(addr = %bind_addr, "Mirqab API listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized".to_string(),
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    tracing::error!(error = %err, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: err.to_string(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    /// Whether the report store answered a probe query.
    database_available: bool,
    /// Whether the generation API answered the reachability probe.
    gemini_api_available: bool,
}

/// Handler for `GET /health`. Used by load balancers and the dashboard's
/// connectivity indicator.
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database_available = state
        .store
        .query_reports(&RetrievalFilter::recent(1))
        .await
        .is_ok();
    let gemini_api_available = match &state.gemini {
        Some(g) => g.check_connection().await,
        None => false,
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database_available,
        gemini_api_available,
    })
}

// ============ POST /api/moraqib_query ============

#[derive(Deserialize)]
struct MoraqibQueryRequest {
    query: String,
}

/// Handler for `POST /api/moraqib_query`.
///
/// Runs the question through the RAG pipeline. The pipeline never fails;
/// generation and retrieval problems degrade inside it, so the only
/// client error here is an empty question.
async fn handle_moraqib_query(
    State(state): State<AppState>,
    Json(req): Json<MoraqibQueryRequest>,
) -> Result<Json<mirqab_core::models::QueryResult>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    tracing::info!(question = %req.query, "moraqib query");
    let result = state.pipeline.query(&req.query).await;
    Ok(Json(result))
}

// ============ POST /api/report_detection ============

/// Device report payload. Devices send a flat summary plus an optional
/// base64 snapshot; descriptive fields default to placeholders.
#[derive(Deserialize)]
struct ReportDetectionRequest {
    api_key: String,
    #[serde(default)]
    source_device_id: Option<String>,
    #[serde(default)]
    summary_text: Option<String>,
    #[serde(default)]
    metadata: Option<ReportMetadata>,
    #[serde(default)]
    image_data: Option<String>,
    #[serde(default)]
    location: Option<GeoPoint>,
}

#[derive(Deserialize)]
struct ReportMetadata {
    #[serde(default)]
    object_count: u32,
}

#[derive(Serialize)]
struct ReportDetectionResponse {
    success: bool,
    report_id: String,
    timestamp: DateTime<Utc>,
    message: String,
}

/// Handler for `POST /api/report_detection`.
///
/// Ingests a detection report from a field device. The shared API key is
/// checked before anything is stored. The snapshot, if present, is
/// decoded and written to local storage after the id is allocated, then
/// the report row is completed.
async fn handle_report_detection(
    State(state): State<AppState>,
    Json(req): Json<ReportDetectionRequest>,
) -> Result<Json<ReportDetectionResponse>, AppError> {
    if req.api_key != state.config.server.effective_api_key() {
        return Err(unauthorized("Invalid API key"));
    }

    let timestamp = Utc::now();
    let device = req.source_device_id.unwrap_or_else(|| UNKNOWN.to_string());
    let mut report = NewReport::unknown(timestamp, device);
    if let Some(summary) = req.summary_text {
        report.attire_and_camouflage = summary;
    }
    if let Some(meta) = req.metadata {
        report.soldier_count = meta.object_count;
    }
    if let Some(location) = req.location {
        report.location = location;
    }

    let report_id = state.store.save_report(&report).await.map_err(internal)?;

    // The snapshot file is named after the allocated id, so it is stored
    // after the insert and the row is updated with the resulting URL.
    if let Some(image_data) = req.image_data {
        match state.storage.store_image(&image_data, &report_id, "detection") {
            Ok(url) => {
                if let Err(err) = state.store.set_image_urls(&report_id, &url, "").await {
                    tracing::warn!(report_id = %report_id, error = %err, "failed to record image URL");
                }
            }
            Err(err) => {
                tracing::warn!(report_id = %report_id, error = %err, "failed to store snapshot");
            }
        }
    }

    tracing::info!(report_id = %report_id, "detection report ingested");

    Ok(Json(ReportDetectionResponse {
        success: true,
        report_id,
        timestamp,
        message: "Report saved successfully".to_string(),
    }))
}

// ============ GET /api/detection-reports ============

#[derive(Deserialize)]
struct DetectionReportsParams {
    #[serde(default = "default_time_range")]
    time_range: String,
    #[serde(default = "default_list_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_time_range() -> String {
    "24h".to_string()
}
fn default_list_limit() -> i64 {
    100
}

/// Dashboard view of one report: the stored fields plus the SOC triage
/// columns the console renders.
#[derive(Serialize)]
struct DashboardDetection {
    report_id: String,
    timestamp: DateTime<Utc>,
    location: GeoPoint,
    soldier_count: u32,
    attire_and_camouflage: String,
    environment: String,
    equipment: String,
    image_snapshot_url: String,
    segmented_image_url: String,
    source_device_id: String,
    ai_summary: String,
    severity: Severity,
    status: String,
    assignee: String,
}

#[derive(Serialize)]
struct DetectionReportsResponse {
    success: bool,
    detections: Vec<DashboardDetection>,
    total: usize,
    time_range: String,
}

fn parse_time_range(value: &str) -> Result<Option<Duration>, AppError> {
    crate::reports::parse_time_range(value).map_err(|e| bad_request(e.to_string()))
}

/// Handler for `GET /api/detection-reports`.
async fn handle_detection_reports(
    State(state): State<AppState>,
    Query(params): Query<DetectionReportsParams>,
) -> Result<Json<DetectionReportsResponse>, AppError> {
    if params.limit < 1 {
        return Err(bad_request("limit must be >= 1"));
    }

    let window = parse_time_range(&params.time_range)?;
    let mut filter = RetrievalFilter::recent(params.limit);
    filter.offset = params.offset.max(0);
    if let Some(duration) = window {
        filter.start = Some(Utc::now() - duration);
    }

    let reports = state.store.query_reports(&filter).await.map_err(internal)?;

    let detections: Vec<DashboardDetection> = reports
        .into_iter()
        .map(|r| DashboardDetection {
            severity: r.severity(),
            status: "New".to_string(),
            assignee: "Unassigned".to_string(),
            report_id: r.report_id,
            timestamp: r.timestamp,
            location: r.location,
            soldier_count: r.soldier_count,
            attire_and_camouflage: r.attire_and_camouflage,
            environment: r.environment,
            equipment: r.equipment,
            image_snapshot_url: r.image_snapshot_url,
            segmented_image_url: r.segmented_image_url,
            source_device_id: r.source_device_id,
            ai_summary: r.ai_summary,
        })
        .collect();

    Ok(Json(DetectionReportsResponse {
        success: true,
        total: detections.len(),
        detections,
        time_range: params.time_range,
    }))
}

// ============ GET /api/detection-stats ============

#[derive(Deserialize)]
struct DetectionStatsParams {
    #[serde(default = "default_time_range")]
    time_range: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DetectionStats {
    total_detections: usize,
    critical_alerts: usize,
    alerts_by_status: AlertsByStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AlertsByStatus {
    new: usize,
    in_progress: usize,
    closed: usize,
}

#[derive(Serialize)]
struct DetectionStatsResponse {
    success: bool,
    stats: DetectionStats,
}

/// Handler for `GET /api/detection-stats`.
///
/// KPI figures for the dashboard cards. Every report is counted as `new`
/// until triage states are persisted.
async fn handle_detection_stats(
    State(state): State<AppState>,
    Query(params): Query<DetectionStatsParams>,
) -> Result<Json<DetectionStatsResponse>, AppError> {
    let window = parse_time_range(&params.time_range)?;
    let mut filter = RetrievalFilter::recent(1000);
    if let Some(duration) = window {
        filter.start = Some(Utc::now() - duration);
    }

    let reports = state.store.query_reports(&filter).await.map_err(internal)?;

    let total_detections = reports.len();
    let critical_alerts = reports
        .iter()
        .filter(|r| r.severity() == Severity::High)
        .count();

    Ok(Json(DetectionStatsResponse {
        success: true,
        stats: DetectionStats {
            total_detections,
            critical_alerts,
            alerts_by_status: AlertsByStatus {
                new: total_detections,
                in_progress: 0,
                closed: 0,
            },
        },
    }))
}

