use std::collections::HashSet;

use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::item::Item;
use crate::models::job::{Job, JobStatus, Progress};
use crate::models::result::ItemResult;

/// Body of `POST /submit-job`.
///
/// Every field is optional at the serde layer so that absent fields surface
/// as validation errors naming the field instead of opaque parse failures.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitJobRequest {
    #[serde(rename = "jobId")]
    #[garde(required, length(min = 1))]
    pub job_id: Option<String>,

    #[serde(rename = "items")]
    #[garde(required, length(min = 1), dive, custom(unique_item_ids))]
    pub items: Option<Vec<ItemRequest>>,
}

/// Each `itemId` may appear once per submission: the job counts one result
/// per (jobId, itemId), so a repeat could never be counted.
fn unique_item_ids(items: &Option<Vec<ItemRequest>>, _ctx: &()) -> garde::Result {
    let mut seen = HashSet::new();
    for id in items.iter().flatten().filter_map(|item| item.item_id.as_deref()) {
        if !seen.insert(id) {
            return Err(garde::Error::new(format!("duplicate itemId `{id}`")));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct ItemRequest {
    #[serde(rename = "itemId")]
    #[garde(required)]
    pub item_id: Option<String>,

    #[serde(rename = "type")]
    #[garde(required)]
    pub item_type: Option<String>,

    #[serde(rename = "payload")]
    #[garde(skip)]
    pub payload: Option<serde_json::Value>,
}

impl SubmitJobRequest {
    /// Split a validated request into its job id and items.
    pub fn into_parts(self) -> (String, Vec<Item>) {
        let items = self
            .items
            .unwrap_or_default()
            .into_iter()
            .map(|item| Item {
                item_id: item.item_id.unwrap_or_default(),
                item_type: item.item_type.unwrap_or_default(),
                payload: item.payload,
            })
            .collect();

        (self.job_id.unwrap_or_default(), items)
    }
}

/// Response after a job has been accepted and fanned out.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobResponse {
    pub message: String,
    pub job_id: String,
    pub item_count: usize,
    pub status: JobStatus,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTimestamps {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response for `GET /jobs/{job_id}`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub total_items: i64,
    pub processed_items: i64,
    pub owner_id: String,
    pub metadata: JobTimestamps,
    pub progress: Progress,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        let progress = job.progress();
        Self {
            job_id: job.job_id,
            status: job.status,
            total_items: job.total_items,
            processed_items: job.processed_items,
            owner_id: job.owner_id,
            metadata: JobTimestamps {
                created_at: job.created_at,
                updated_at: job.updated_at,
            },
            progress,
        }
    }
}

/// Query string of `GET /results`.
#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    #[serde(rename = "jobId")]
    pub job_id: Option<String>,
}

/// One processed item as returned by the results endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResultView {
    pub item_id: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub fingerprint: String,
    pub duration_ms: i64,
    pub is_valid: bool,
    pub processed_at: DateTime<Utc>,
    pub processed_data: serde_json::Value,
}

impl From<ItemResult> for ItemResultView {
    fn from(result: ItemResult) -> Self {
        Self {
            item_id: result.item_id,
            item_type: result.item_type,
            fingerprint: result.fingerprint,
            duration_ms: result.duration_ms,
            is_valid: result.is_valid,
            processed_at: result.processed_at,
            processed_data: result.processed_data,
        }
    }
}

/// Response for `GET /results?jobId=...`. Results are sorted by item id.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResultsResponse {
    pub job_id: String,
    pub job_status: JobStatus,
    pub total_items: i64,
    pub results_count: usize,
    pub results: Vec<ItemResultView>,
}
