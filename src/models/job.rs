use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle of a job. Variants are declared in transition order, so
/// `Ord` doubles as the "may advance to" relation.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, PartialEq, Eq, PartialOrd, Ord,
)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
}

impl JobStatus {
    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        next > self
    }
}

/// A caller-submitted batch of items processed asynchronously.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    pub total_items: i64,
    pub processed_items: i64,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(job_id: impl Into<String>, total_items: i64, owner_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            status: JobStatus::Pending,
            total_items,
            processed_items: 0,
            owner_id: owner_id.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.processed_items >= self.total_items
    }

    pub fn progress(&self) -> Progress {
        Progress::of(self.processed_items, self.total_items)
    }
}

/// Derived progress of a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Progress {
    pub percentage: f64,
    pub completed: bool,
}

impl Progress {
    /// Percentage rounded to two decimals; zero when there is nothing to process.
    pub fn of(processed: i64, total: i64) -> Self {
        let percentage = if total == 0 {
            0.0
        } else {
            (processed as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
        };

        Self {
            percentage,
            completed: processed == total,
        }
    }
}
