use garde::Validate;

use crate::error::AppError;
use crate::models::api::{JobResultsResponse, JobStatusResponse, SubmitJobRequest, SubmitJobResponse};
use crate::models::item::{ItemMessage, ATTR_ITEM_ID, ATTR_JOB_ID};
use crate::models::job::{Job, JobStatus};
use crate::services::queue::{OutgoingMessage, QueueError, WorkQueue};
use crate::services::store::{JobStore, ResultStore, StoreError};

/// Validate a submission, record the job and fan out one message per item.
///
/// The job record is written before any message is published, because workers
/// increment a counter that must already exist. A publish failure part-way
/// through leaves the job `Pending` with some items queued; no rollback is
/// attempted and the caller sees a dependency error.
pub async fn submit_job(
    jobs: &dyn JobStore,
    queue: &dyn WorkQueue,
    request: SubmitJobRequest,
    owner_id: &str,
) -> Result<SubmitJobResponse, AppError> {
    request
        .validate()
        .map_err(|report| AppError::Validation(first_violation(&report)))?;

    let (job_id, items) = request.into_parts();
    let job = Job::new(job_id.as_str(), items.len() as i64, owner_id);
    jobs.create_job(&job).await?;

    tracing::info!(
        job_id = %job_id,
        owner_id = %owner_id,
        item_count = items.len(),
        "Job created, fanning out items"
    );

    for (published, item) in items.iter().enumerate() {
        let body = serde_json::to_string(&ItemMessage {
            job_id: job_id.clone(),
            item: item.clone(),
        })
        .map_err(QueueError::Serialize)?;

        let message = OutgoingMessage::new(body)
            .with_attribute(ATTR_JOB_ID, job_id.as_str())
            .with_attribute(ATTR_ITEM_ID, item.item_id.as_str());

        if let Err(e) = queue.publish(&message).await {
            tracing::error!(
                job_id = %job_id,
                item_id = %item.item_id,
                published,
                error = %e,
                "Fan-out interrupted"
            );
            return Err(e.into());
        }
    }

    metrics::counter!("jobs_submitted_total").increment(1);
    metrics::counter!("items_published_total").increment(items.len() as u64);

    jobs.advance_status(&job_id, JobStatus::Processing).await?;

    Ok(SubmitJobResponse {
        message: "Job submitted successfully".to_string(),
        job_id,
        item_count: items.len(),
        status: JobStatus::Processing,
    })
}

/// Re-read the job and flip it to `Completed` once every item is counted.
///
/// Reads the freshest counter rather than trusting the caller's view, since
/// other workers may have incremented in between. Safe to call repeatedly.
pub async fn check_completion(jobs: &dyn JobStore, job_id: &str) -> Result<bool, StoreError> {
    let Some(job) = jobs.get_job(job_id).await? else {
        return Ok(false);
    };

    if !job.is_complete() {
        return Ok(false);
    }

    if jobs.advance_status(job_id, JobStatus::Completed).await? {
        metrics::counter!("jobs_completed_total").increment(1);
        tracing::info!(job_id = %job_id, total_items = job.total_items, "Job completed");
    }

    Ok(true)
}

pub async fn job_status(jobs: &dyn JobStore, job_id: &str) -> Result<JobStatusResponse, AppError> {
    let job = jobs
        .get_job(job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(job_id.to_string()))?;

    Ok(job.into())
}

pub async fn job_results(
    jobs: &dyn JobStore,
    results: &dyn ResultStore,
    job_id: &str,
) -> Result<JobResultsResponse, AppError> {
    let job = jobs
        .get_job(job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(job_id.to_string()))?;

    let mut records = results.results_for_job(job_id).await?;
    records.sort_by(|a, b| a.item_id.cmp(&b.item_id));

    tracing::debug!(job_id = %job_id, count = records.len(), "Results fetched");

    Ok(JobResultsResponse {
        job_id: job.job_id,
        job_status: job.status,
        total_items: job.total_items,
        results_count: records.len(),
        results: records.into_iter().map(Into::into).collect(),
    })
}

fn first_violation(report: &garde::Report) -> String {
    report
        .iter()
        .next()
        .map(|(path, error)| format!("{path}: {error}"))
        .unwrap_or_else(|| report.to_string())
}
