//! Black-box API tests
//!
//! Each test serves the router on an ephemeral port over in-memory backends
//! and drives it with reqwest. Workers run in-process against the same
//! backends, so no PostgreSQL or Redis is needed.

use job_fanout::{
    app_state::AppState,
    routes,
    services::{
        auth::{Claims, TokenVerifier},
        memory::{InMemoryQueue, InMemoryStore},
        processor::ItemProcessor,
        worker::{Worker, WorkerOptions},
    },
};
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;

const SECRET: &str = "api-test-secret";

struct TestApp {
    base_url: String,
    client: reqwest::Client,
    store: Arc<InMemoryStore>,
    queue: Arc<InMemoryQueue>,
}

impl TestApp {
    async fn spawn() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let queue = Arc::new(InMemoryQueue::default());
        let state = AppState::new(
            store.clone(),
            store.clone(),
            queue.clone(),
            TokenVerifier::new(SECRET),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind ephemeral port");
        let addr = listener.local_addr().expect("No local address");
        tokio::spawn(async move {
            axum::serve(listener, routes::router(state))
                .await
                .expect("Server error");
        });

        Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            store,
            queue,
        }
    }

    fn worker(&self) -> Worker {
        Worker::new(
            self.store.clone(),
            self.store.clone(),
            self.queue.clone(),
            ItemProcessor::default(),
            WorkerOptions::default(),
        )
    }

    async fn submit(&self, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}/submit-job", self.base_url))
            .bearer_auth(token("user-1"))
            .json(&body)
            .send()
            .await
            .expect("Submit request failed")
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("GET request failed")
    }
}

fn token(sub: &str) -> String {
    let claims = Claims {
        sub: Some(sub.to_string()),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("Failed to mint token")
}

/// Drain the queue with a single worker.
async fn drain(worker: &Worker) {
    while worker.poll_once().await.expect("Poll failed") > 0 {}
}

fn mixed_job(job_id: &str) -> Value {
    json!({
        "jobId": job_id,
        "items": [
            {"itemId": "2", "type": "video", "payload": {"url": "https://cdn.example/clip.mp4"}},
            {"itemId": "1", "type": "image", "payload": {"url": "https://cdn.example/a.png"}},
            {"itemId": "3", "type": "TEXT", "payload": {"text": "hello"}}
        ]
    })
}

#[tokio::test]
async fn test_submit_returns_accepted() {
    let app = TestApp::spawn().await;

    let response = app.submit(mixed_job("J1")).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["jobId"], "J1");
    assert_eq!(body["itemCount"], 3);
    assert_eq!(body["status"], "Processing");
    assert_eq!(app.queue.pending().len(), 3);
}

#[tokio::test]
async fn test_submit_requires_token() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(format!("{}/submit-job", app.base_url))
        .json(&mixed_job("J1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Unauthorized");

    let response = app
        .client
        .post(format!("{}/submit-job", app.base_url))
        .bearer_auth("not-a-jwt")
        .json(&mixed_job("J1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.queue.pending().is_empty());
}

#[tokio::test]
async fn test_invalid_submissions_rejected() {
    let app = TestApp::spawn().await;

    let response = app.submit(json!({"jobId": "J1", "items": []})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "ValidationError");

    let response = app.submit(json!({"items": [{"itemId": "a", "type": "TEXT"}]})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .client
        .post(format!("{}/submit-job", app.base_url))
        .bearer_auth(token("user-1"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(app.queue.pending().is_empty());
    assert_eq!(app.get("/jobs/J1").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_item_ids_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .submit(json!({
            "jobId": "J1",
            "items": [
                {"itemId": "a", "type": "TEXT"},
                {"itemId": "a", "type": "IMAGE", "payload": {"url": "u"}}
            ]
        }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "ValidationError");
    assert!(body["message"].as_str().unwrap().contains("items"));

    assert!(app.queue.pending().is_empty());
    assert_eq!(app.get("/jobs/J1").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_job_id_conflicts() {
    let app = TestApp::spawn().await;

    assert_eq!(app.submit(mixed_job("J1")).await.status(), StatusCode::ACCEPTED);

    let response = app.submit(mixed_job("J1")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Conflict");
    assert_eq!(app.queue.pending().len(), 3);
}

#[tokio::test]
async fn test_unknown_job_not_found() {
    let app = TestApp::spawn().await;

    let response = app.get("/jobs/unknown-id").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "NotFound");

    let response = app.get("/results?jobId=unknown-id").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get("/results").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_job_runs_to_completion() {
    let app = TestApp::spawn().await;
    assert_eq!(app.submit(mixed_job("J1")).await.status(), StatusCode::ACCEPTED);

    let status: Value = app.get("/jobs/J1").await.json().await.unwrap();
    assert_eq!(status["status"], "Processing");
    assert_eq!(status["totalItems"], 3);
    assert_eq!(status["processedItems"], 0);
    assert_eq!(status["ownerId"], "user-1");
    assert_eq!(status["progress"]["completed"], false);

    drain(&app.worker()).await;

    let status: Value = app.get("/jobs/J1").await.json().await.unwrap();
    assert_eq!(status["status"], "Completed");
    assert_eq!(status["processedItems"], 3);
    assert_eq!(status["progress"]["percentage"], 100.0);
    assert_eq!(status["progress"]["completed"], true);

    let results: Value = app.get("/results?jobId=J1").await.json().await.unwrap();
    assert_eq!(results["jobStatus"], "Completed");
    assert_eq!(results["resultsCount"], 3);

    let results = results["results"].as_array().unwrap();
    let ids: Vec<_> = results.iter().map(|r| r["itemId"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);

    // Image has a url; video lacks a duration; text has no rules.
    assert_eq!(results[0]["isValid"], true);
    assert_eq!(results[1]["isValid"], false);
    assert_eq!(results[2]["isValid"], true);

    assert_eq!(results[0]["processedData"]["type"], "IMAGE");
    assert_eq!(results[0]["processedData"]["enrichment"]["category"], "MEDIA");
    assert_eq!(results[2]["processedData"]["enrichment"]["category"], "CONTENT");
    assert_eq!(results[0]["fingerprint"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn test_concurrent_workers_count_each_item_once() {
    let app = TestApp::spawn().await;

    let items: Vec<Value> = (0..40)
        .map(|i| json!({"itemId": format!("item-{i:02}"), "type": "TEXT", "payload": {"n": i}}))
        .collect();
    let response = app.submit(json!({"jobId": "BIG", "items": items})).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let workers: Vec<Worker> = (0..4).map(|_| app.worker()).collect();
    futures::future::join_all(workers.iter().map(drain)).await;

    let status: Value = app.get("/jobs/BIG").await.json().await.unwrap();
    assert_eq!(status["status"], "Completed");
    assert_eq!(status["processedItems"], 40);

    let results: Value = app.get("/results?jobId=BIG").await.json().await.unwrap();
    assert_eq!(results["resultsCount"], 40);
    assert_eq!(app.queue.in_flight_len(), 0);
}

#[tokio::test]
async fn test_health_reports_degraded_dependency() {
    let app = TestApp::spawn().await;

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    app.queue.set_unavailable(true);
    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["database"]["status"], "ok");
    assert_eq!(body["checks"]["queue"]["status"], "error");
}
