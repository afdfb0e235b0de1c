use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

pub mod health;
pub mod jobs;
pub mod metrics;

/// API routes over the shared state. `/metrics` is mounted separately by the
/// server since it carries its own state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/submit-job", post(jobs::submit_job))
        .route("/jobs/{job_id}", get(jobs::get_job_status))
        .route("/results", get(jobs::get_job_results))
        .with_state(state)
}
