//! HTTP API handlers for Coding Coach.
//!
//! - **POST /analyze**: fetch every requested judge, aggregate, log a session summary.
//! - **POST /normalize**: aggregate caller-supplied activity JSON, no network.
//! - **GET /metrics**: request and fetch counters.
//! - **GET /health**: liveness plus the same counters.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json,
    extract::State,
    http::header,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::aggregation::{NormalizeInput, normalize};
use crate::error::ApiError;
use crate::metrics::{MetricsSink, RequestMetrics};
use crate::model::{AnalyzeRequest, AnalyzeResponse, NormalizedActivities};
use crate::orchestrator::FetchOrchestrator;
use crate::storage::SessionStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: FetchOrchestrator,
    pub sessions: SessionStore,
    pub metrics: Arc<RequestMetrics>,
}

/// POST /analyze - Fetch and aggregate a user's practice history.
///
/// # Request Body
///
/// ```json
/// {
///     "user_id": "u-123",
///     "handles": {"codeforces": "tourist", "leetcode": "alice"},
///     "session_id": 7
/// }
/// ```
///
/// `session_id` is optional; an unknown or missing id starts a new session.
///
/// # Errors
///
/// - `400` when no handle is non-blank
/// - `404` when every platform came back empty
#[instrument(skip_all, fields(user_id))]
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::Span::current().record("user_id", request.user_id.as_str());

    let started = Instant::now();
    let result = run_analysis(&state, request).await;
    state
        .metrics
        .record_request("/analyze", started.elapsed(), result.is_ok());

    let response = result?;
    Ok((
        [(header::CACHE_CONTROL, "no-store, no-cache, must-revalidate")],
        Json(response),
    ))
}

async fn run_analysis(
    state: &AppState,
    request: AnalyzeRequest,
) -> Result<AnalyzeResponse, ApiError> {
    if request.handles.values().all(|h| h.trim().is_empty()) {
        return Err(ApiError::BadRequest(
            "at least one platform handle is required".to_string(),
        ));
    }

    let fetched = state.orchestrator.fetch_all(&request.handles).await;
    if fetched.is_total_failure() {
        warn!("No data from any platform");
        return Err(ApiError::NotFound(
            "no data found for the provided handles; check that they are spelled correctly"
                .to_string(),
        ));
    }

    let normalized = normalize(fetched);
    let now = Utc::now().timestamp();
    let session_id = record_session(state, &request, &normalized, now).await;

    info!(
        session_id = ?session_id,
        activities = normalized.total_count,
        platforms = normalized.platforms.len(),
        "Analysis complete"
    );

    Ok(AnalyzeResponse {
        session_id,
        fetched_at: now,
        normalized,
    })
}

/// Resolve or create the session and store the snapshot summary.
///
/// Storage failures are logged and yield `None`; they never fail the request.
async fn record_session(
    state: &AppState,
    request: &AnalyzeRequest,
    summary: &NormalizedActivities,
    now: i64,
) -> Option<i64> {
    let existing = match request.session_id {
        Some(id) => match state.sessions.get_session(id).await {
            Ok(Some(session)) if session.user_id == request.user_id => Some(id),
            Ok(_) => {
                warn!(session_id = id, "Unknown session, starting a new one");
                None
            }
            Err(e) => {
                warn!(session_id = id, error = %e, "Failed to look up session");
                None
            }
        },
        None => None,
    };

    let session_id = match existing {
        Some(id) => id,
        None => match state.sessions.create_session(&request.user_id, now).await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Failed to create session");
                return None;
            }
        },
    };

    if let Err(e) = state.sessions.record_summary(session_id, summary, now).await {
        warn!(session_id, error = %e, "Failed to record session summary");
    }

    Some(session_id)
}

/// POST /normalize - Aggregate an activity payload without fetching.
///
/// Accepts `{activities, stats}`, a flat activity list, or a list of lists.
#[instrument(skip_all)]
pub async fn normalize_payload(Json(payload): Json<Value>) -> Json<NormalizedActivities> {
    let normalized = normalize(NormalizeInput::from_value(&payload));

    info!(
        activities = normalized.total_count,
        "Normalized supplied activities"
    );

    Json(normalized)
}

/// GET /metrics - Per-name request counters.
pub async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

/// GET /health - Health check with current counters.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "metrics": state.metrics.snapshot(),
    }))
}
