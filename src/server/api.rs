use super::store::{LogfileStore, ScanError};
use crate::catalog::LogfilesResponse;
use crate::query::{now_micros, DEFAULT_SCAN_LIMIT};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::{self, Stream};
use serde::Deserialize;
use std::sync::Arc;

/// Largest `limit` a single scan may ask for
pub const MAX_SCAN_LIMIT: usize = 1000;

/// Shared state for the scan API
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: Arc<LogfileStore>,
    pub batch_size: usize,
}

#[derive(Debug, Deserialize)]
pub struct ScanQuery {
    #[serde(default)]
    pub logfile: Option<String>,
    /// Exclusive upper bound in microseconds; now when absent
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /api/v1/logfiles
pub async fn list_logfiles(State(state): State<AppState>) -> Json<LogfilesResponse> {
    Json(LogfilesResponse {
        logfile_definitions: state.store.definitions(),
    })
}

/// GET /api/v1/logfiles/scan?logfile=NAME&time=US&limit=N
///
/// Streams `ScanBatch` JSON as SSE message events, newest rows first.
pub async fn scan_logfile(
    State(state): State<AppState>,
    Query(query): Query<ScanQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let logfile = match query.logfile {
        Some(name) if !name.is_empty() => name,
        _ => return Err(ApiError::BadRequest("logfile is required".to_string())),
    };

    let end_time = query.time.unwrap_or_else(now_micros);
    if end_time <= 0 {
        return Err(ApiError::BadRequest(format!(
            "time must be a positive microsecond timestamp, got {}",
            end_time
        )));
    }

    let limit = query
        .limit
        .unwrap_or(DEFAULT_SCAN_LIMIT)
        .clamp(1, MAX_SCAN_LIMIT);

    let scan = state
        .store
        .scan(&logfile, end_time, limit, state.batch_size)
        .await?;

    tracing::info!(logfile = %logfile, end_time, limit, "Streaming scan");

    let events = stream::unfold(Some(scan), move |scan| {
        let logfile = logfile.clone();
        async move {
            let mut scan = scan?;
            match scan.next_batch().await {
                Ok(Some(batch)) => {
                    if batch.is_finished() {
                        tracing::debug!(
                            logfile = %logfile,
                            rows_scanned = batch.rows_scanned,
                            "Scan finished"
                        );
                    }
                    Some((Event::default().json_data(&batch), Some(scan)))
                }
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!(logfile = %logfile, error = %e, "Scan aborted by read error");
                    let event = Event::default()
                        .event("error")
                        .data(format!("failed to read logfile: {}", e));
                    Some((Ok(event), None))
                }
            }
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

// Error handling
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalError(String),
}

impl From<ScanError> for ApiError {
    fn from(e: ScanError) -> Self {
        match e {
            ScanError::UnknownLogfile(name) => {
                ApiError::NotFound(format!("unknown logfile '{}'", name))
            }
            other => {
                tracing::error!(error = %other, "Scan failed to start");
                ApiError::InternalError(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
