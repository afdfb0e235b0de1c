use std::str::FromStr;

use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, PgPool, Row};

use crate::models::job::{Job, JobStatus};
use crate::models::result::ItemResult;

fn job_from_row(row: &PgRow) -> Result<Job, sqlx::Error> {
    let status_str: String = row.try_get("status")?;
    let status = JobStatus::from_str(&status_str).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(Job {
        job_id: row.try_get("job_id")?,
        status,
        total_items: row.try_get("total_items")?,
        processed_items: row.try_get("processed_items")?,
        owner_id: row.try_get("owner_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn result_from_row(row: &PgRow) -> Result<ItemResult, sqlx::Error> {
    Ok(ItemResult {
        job_id: row.try_get("job_id")?,
        item_id: row.try_get("item_id")?,
        item_type: row.try_get("item_type")?,
        fingerprint: row.try_get("fingerprint")?,
        duration_ms: row.try_get("duration_ms")?,
        is_valid: row.try_get("is_valid")?,
        processed_data: row.try_get("processed_data")?,
        processed_at: row.try_get("processed_at")?,
    })
}

/// Position of a status in the lifecycle, mirrored by the CASE in
/// [`advance_job_status`].
fn status_rank(status: JobStatus) -> i32 {
    status as i32
}

/// Insert a new job unless the id is taken. Returns whether a row was written.
pub async fn insert_job(pool: &PgPool, job: &Job) -> Result<bool, sqlx::Error> {
    let done = sqlx::query(
        r#"
        INSERT INTO jobs (job_id, status, total_items, processed_items, owner_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (job_id) DO NOTHING
        "#,
    )
    .bind(&job.job_id)
    .bind(job.status.to_string())
    .bind(job.total_items)
    .bind(job.processed_items)
    .bind(&job.owner_id)
    .bind(job.created_at)
    .bind(job.updated_at)
    .execute(pool)
    .await?;

    Ok(done.rows_affected() == 1)
}

/// Get a job by ID
pub async fn get_job<'c, E>(executor: E, job_id: &str) -> Result<Option<Job>, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let row = sqlx::query(
        r#"
        SELECT job_id, status, total_items, processed_items, owner_id, created_at, updated_at
        FROM jobs
        WHERE job_id = $1
        "#,
    )
    .bind(job_id)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Move a job to `status` if that is forward in its lifecycle.
pub async fn advance_job_status(
    pool: &PgPool,
    job_id: &str,
    status: JobStatus,
) -> Result<bool, sqlx::Error> {
    let done = sqlx::query(
        r#"
        UPDATE jobs
        SET status = $1,
            updated_at = NOW()
        WHERE job_id = $2
          AND (CASE status WHEN 'Pending' THEN 0 WHEN 'Processing' THEN 1 ELSE 2 END) < $3
        "#,
    )
    .bind(status.to_string())
    .bind(job_id)
    .bind(status_rank(status))
    .execute(pool)
    .await?;

    Ok(done.rows_affected() == 1)
}

/// Atomically add one to `processed_items` without passing `total_items`.
///
/// Returns `None` when the job does not exist or is already fully counted.
pub async fn increment_processed_items<'c, E>(executor: E, job_id: &str) -> Result<Option<Job>, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let row = sqlx::query(
        r#"
        UPDATE jobs
        SET processed_items = processed_items + 1,
            updated_at = NOW()
        WHERE job_id = $1
          AND processed_items < total_items
        RETURNING job_id, status, total_items, processed_items, owner_id, created_at, updated_at
        "#,
    )
    .bind(job_id)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Insert an item result unless one exists for (job_id, item_id).
pub async fn insert_result_if_absent<'c, E>(executor: E, result: &ItemResult) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let done = sqlx::query(
        r#"
        INSERT INTO item_results
            (job_id, item_id, item_type, fingerprint, duration_ms, is_valid, processed_data, processed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (job_id, item_id) DO NOTHING
        "#,
    )
    .bind(&result.job_id)
    .bind(&result.item_id)
    .bind(&result.item_type)
    .bind(&result.fingerprint)
    .bind(result.duration_ms)
    .bind(result.is_valid)
    .bind(&result.processed_data)
    .bind(result.processed_at)
    .execute(executor)
    .await?;

    Ok(done.rows_affected() == 1)
}

/// All results of a job, ordered by item id
pub async fn get_results_by_job(pool: &PgPool, job_id: &str) -> Result<Vec<ItemResult>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT job_id, item_id, item_type, fingerprint, duration_ms, is_valid, processed_data, processed_at
        FROM item_results
        WHERE job_id = $1
        ORDER BY item_id ASC
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(result_from_row).collect()
}
