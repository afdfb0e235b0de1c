use async_trait::async_trait;

use crate::models::job::{Job, JobStatus};
use crate::models::result::ItemResult;

/// Keyed store of job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job. Fails with [`StoreError::AlreadyExists`] if the id is taken.
    async fn create_job(&self, job: &Job) -> Result<(), StoreError>;

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, StoreError>;

    /// Move a job forward in its lifecycle. Requests that would move it
    /// backwards (or keep it in place) are ignored and return `false`.
    async fn advance_status(&self, job_id: &str, status: JobStatus) -> Result<bool, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Append-only store of per-item results keyed by (job_id, item_id).
///
/// `record_result` is the only cross-worker coordination point: the result
/// insert and the job's processed-counter add happen as one atomic step, so
/// an item is either recorded and counted or neither.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Store a result and add one to its job's `processed_items`, saturating
    /// at `total_items`. A result already present for the key is left as is
    /// and nothing is counted. Fails with [`StoreError::JobNotFound`], writing
    /// nothing, when the job does not exist.
    async fn record_result(&self, result: &ItemResult) -> Result<RecordOutcome, StoreError>;

    /// All results recorded for a job, in no particular order.
    async fn results_for_job(&self, job_id: &str) -> Result<Vec<ItemResult>, StoreError>;
}

/// Outcome of [`ResultStore::record_result`].
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    /// The result was stored and counted; the job as it stands afterwards.
    Counted(Job),
    /// A result for the same (job_id, item_id) was already stored.
    AlreadyRecorded,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Job {0} already exists")]
    AlreadyExists(String),

    #[error("Job {0} not found")]
    JobNotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
