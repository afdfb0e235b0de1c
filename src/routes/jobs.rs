use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::app_state::AppState;
use crate::error::AppError;
use crate::models::api::{
    JobResultsResponse, JobStatusResponse, ResultsQuery, SubmitJobRequest, SubmitJobResponse,
};
use crate::services::auth::Caller;
use crate::services::jobs;

/// POST /submit-job: accept a job and fan its items out to the queue.
pub async fn submit_job(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<SubmitJobRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitJobResponse>), AppError> {
    let Json(request) = payload.map_err(|rejection| AppError::Validation(rejection.body_text()))?;

    let response = jobs::submit_job(state.jobs.as_ref(), state.queue.as_ref(), request, &caller.subject).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /jobs/{job_id}
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, AppError> {
    let status = jobs::job_status(state.jobs.as_ref(), &job_id).await?;
    Ok(Json(status))
}

/// GET /results?jobId=
pub async fn get_job_results(
    State(state): State<AppState>,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<JobResultsResponse>, AppError> {
    let job_id = query
        .job_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::Validation("jobId query parameter is required".to_string()))?;

    let results = jobs::job_results(state.jobs.as_ref(), state.results.as_ref(), &job_id).await?;
    Ok(Json(results))
}
