use serde::{Deserialize, Serialize};

/// Queue message attribute carrying the owning job.
pub const ATTR_JOB_ID: &str = "jobId";

/// Queue message attribute carrying the item identifier.
pub const ATTR_ITEM_ID: &str = "itemId";

/// One unit of work within a job. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub item_id: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

/// Body of a work-queue message: one item of one job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemMessage {
    pub job_id: String,
    pub item: Item,
}
