//! Job fixtures for E2E testing

use serde_json::{json, Value};

/// A submitted item and the validity the worker should record for it.
#[derive(Debug, Clone, Copy)]
pub struct ItemFixture {
    pub item_id: &'static str,
    pub item_type: &'static str,
    pub payload: Option<&'static str>,
    pub expect_valid: bool,
    pub expect_category: &'static str,
}

impl ItemFixture {
    pub fn to_json(&self) -> Value {
        let mut item = json!({"itemId": self.item_id, "type": self.item_type});
        if let Some(payload) = self.payload {
            item["payload"] = serde_json::from_str(payload).expect("fixture payload is JSON");
        }
        item
    }
}

pub const MIXED_ITEMS: &[ItemFixture] = &[
    ItemFixture {
        item_id: "1",
        item_type: "IMAGE",
        payload: Some(r#"{"url": "https://cdn.example/label.png"}"#),
        expect_valid: true,
        expect_category: "MEDIA",
    },
    ItemFixture {
        item_id: "2",
        item_type: "VIDEO",
        payload: Some(r#"{"url": "https://cdn.example/clip.mp4"}"#),
        expect_valid: false,
        expect_category: "MEDIA",
    },
    ItemFixture {
        item_id: "3",
        item_type: "TEXT",
        payload: Some(r#"{"text": "hello"}"#),
        expect_valid: true,
        expect_category: "CONTENT",
    },
    ItemFixture {
        item_id: "4",
        item_type: "video",
        payload: Some(r#"{"url": "https://cdn.example/full.mp4", "duration": 42}"#),
        expect_valid: true,
        expect_category: "MEDIA",
    },
    ItemFixture {
        item_id: "5",
        item_type: "image",
        payload: None,
        expect_valid: false,
        expect_category: "MEDIA",
    },
    ItemFixture {
        item_id: "6",
        item_type: "AUDIO",
        payload: None,
        expect_valid: true,
        expect_category: "OTHER",
    },
];

/// Request body for a job made of `items`.
pub fn job_body(job_id: &str, items: &[ItemFixture]) -> Value {
    json!({
        "jobId": job_id,
        "items": items.iter().map(ItemFixture::to_json).collect::<Vec<_>>(),
    })
}
