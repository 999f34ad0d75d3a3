//! Job invocation handlers.
//!
//! Each handler runs a job to completion (or until its budget runs out)
//! and answers with the job's report.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use releasekeeper_core::{
    AcquisitionReport, Deadline, DiscoveryReport, JobError, JobRequest, SweepReport,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::state::AppState;

/// Error response
#[derive(Debug, Serialize)]
pub struct JobErrorResponse {
    pub error: String,
}

/// Failure of a job endpoint, rendered as a JSON error body.
#[derive(Debug)]
pub enum ApiError {
    /// The body was not a valid job payload.
    BadPayload(String),
    Job(JobError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadPayload(rejection.body_text())
    }
}

impl From<JobError> for ApiError {
    fn from(error: JobError) -> Self {
        ApiError::Job(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::Job(JobError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            ApiError::Job(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Job(e) => {
                error!(error = %e, "Job failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = match self {
            ApiError::BadPayload(message) => message,
            ApiError::Job(e) => e.to_string(),
        };
        (status, Json(JobErrorResponse { error: message })).into_response()
    }
}

fn deadline(state: &AppState) -> Deadline {
    Deadline::from_secs(state.config().job.budget_secs)
}

/// Run discovery for one slot.
pub async fn discover(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<JobRequest>, JsonRejection>,
) -> Result<Json<DiscoveryReport>, ApiError> {
    let Json(request) = payload?;
    info!(title = %request.title_id, "Discovery requested");
    let report = state.discovery().run(&request, &deadline(&state)).await?;
    Ok(Json(report))
}

/// Run one acquisition pass for one slot.
pub async fn acquire(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<JobRequest>, JsonRejection>,
) -> Result<Json<AcquisitionReport>, ApiError> {
    let Json(request) = payload?;
    info!(title = %request.title_id, "Acquisition requested");
    let report = state.acquisition().run(&request, &deadline(&state)).await?;
    Ok(Json(report))
}

/// Re-arm discovery for a movie or season.
pub async fn rescan(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<JobRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(request) = payload?;
    state.discovery().request_rescan(&request)?;
    info!(title = %request.title_id, season = ?request.season_number, "Rescan requested");
    Ok(StatusCode::NO_CONTENT)
}

/// Run the supervisor once over every title.
pub async fn sweep(State(state): State<Arc<AppState>>) -> Result<Json<SweepReport>, ApiError> {
    let report = state.supervisor().sweep().await?;
    Ok(Json(report))
}
