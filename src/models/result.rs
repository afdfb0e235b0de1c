use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of processing one item, keyed by (job_id, item_id).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult {
    pub job_id: String,
    pub item_id: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub fingerprint: String,
    pub duration_ms: i64,
    pub is_valid: bool,
    pub processed_data: serde_json::Value,
    pub processed_at: DateTime<Utc>,
}
