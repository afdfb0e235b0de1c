use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::queries;
use crate::models::job::{Job, JobStatus};
use crate::models::result::ItemResult;
use crate::services::store::{JobStore, RecordOutcome, ResultStore, StoreError};

/// Postgres-backed job and result store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn create_job(&self, job: &Job) -> Result<(), StoreError> {
        if queries::insert_job(&self.pool, job).await? {
            Ok(())
        } else {
            Err(StoreError::AlreadyExists(job.job_id.clone()))
        }
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        Ok(queries::get_job(&self.pool, job_id).await?)
    }

    async fn advance_status(&self, job_id: &str, status: JobStatus) -> Result<bool, StoreError> {
        Ok(queries::advance_job_status(&self.pool, job_id, status).await?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ResultStore for PgStore {
    async fn record_result(&self, result: &ItemResult) -> Result<RecordOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        if queries::get_job(&mut *tx, &result.job_id).await?.is_none() {
            return Err(StoreError::JobNotFound(result.job_id.clone()));
        }

        if !queries::insert_result_if_absent(&mut *tx, result).await? {
            tx.rollback().await?;
            return Ok(RecordOutcome::AlreadyRecorded);
        }

        let job = match queries::increment_processed_items(&mut *tx, &result.job_id).await? {
            Some(job) => job,
            None => {
                let job = queries::get_job(&mut *tx, &result.job_id)
                    .await?
                    .ok_or_else(|| StoreError::JobNotFound(result.job_id.clone()))?;
                tracing::warn!(
                    job_id = %result.job_id,
                    item_id = %result.item_id,
                    processed_items = job.processed_items,
                    total_items = job.total_items,
                    "Processed counter already at total, increment ignored"
                );
                job
            }
        };

        tx.commit().await?;
        Ok(RecordOutcome::Counted(job))
    }

    async fn results_for_job(&self, job_id: &str) -> Result<Vec<ItemResult>, StoreError> {
        Ok(queries::get_results_by_job(&self.pool, job_id).await?)
    }
}
