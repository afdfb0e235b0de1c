//! Test helper utilities for E2E testing

use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;

use crate::fixtures::ItemFixture;

/// Response from POST /submit-job
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: String,
    pub item_count: usize,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct Progress {
    pub percentage: f64,
    pub completed: bool,
}

/// Response from GET /jobs/{job_id}
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: String,
    pub total_items: i64,
    pub processed_items: i64,
    pub progress: Progress,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult {
    pub item_id: String,
    pub fingerprint: String,
    pub is_valid: bool,
    pub processed_data: Value,
}

/// Response from GET /results?jobId=
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsResponse {
    pub job_status: String,
    pub results_count: usize,
    pub results: Vec<ItemResult>,
}

/// Bearer token signed with `JWT_SECRET` from the environment.
pub fn bearer_token() -> String {
    let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret".to_string());
    let claims = json!({
        "sub": "e2e-user",
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .expect("Failed to sign token")
}

/// Submit a job body
pub async fn submit_job(
    client: &reqwest::Client,
    base_url: &str,
    body: &Value,
) -> Result<SubmitResponse, Box<dyn std::error::Error + Send + Sync>> {
    let response = client
        .post(format!("{}/submit-job", base_url))
        .bearer_auth(bearer_token())
        .json(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await?;
        return Err(format!("Submit failed with status {}: {}", status, error_text).into());
    }

    Ok(response.json::<SubmitResponse>().await?)
}

/// Poll job status until completed (with timeout)
pub async fn poll_job_status(
    client: &reqwest::Client,
    base_url: &str,
    job_id: &str,
    timeout_secs: u64,
) -> Result<JobStatusResponse, Box<dyn std::error::Error + Send + Sync>> {
    let max_attempts = timeout_secs * 2; // Poll every 500ms

    for attempt in 0..max_attempts {
        let response = client
            .get(format!("{}/jobs/{}", base_url, job_id))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Status check failed: {}", error_text).into());
        }

        let status_response = response.json::<JobStatusResponse>().await?;

        match status_response.status.as_str() {
            "Completed" => return Ok(status_response),
            "Pending" | "Processing" => {
                if attempt % 10 == 0 && attempt > 0 {
                    println!(
                        "  ... still waiting ({}/{} items, attempt {}/{})",
                        status_response.processed_items, status_response.total_items, attempt, max_attempts
                    );
                }
                sleep(Duration::from_millis(500)).await;
            }
            _ => {
                return Err(format!("Unknown job status: {}", status_response.status).into());
            }
        }
    }

    Err(format!("Job did not complete within {} seconds", timeout_secs).into())
}

/// Wait for the workers to finish a job (with timeout)
pub async fn wait_for_job_completion(
    client: &reqwest::Client,
    base_url: &str,
    job_id: &str,
) -> Result<JobStatusResponse, Box<dyn std::error::Error + Send + Sync>> {
    poll_job_status(client, base_url, job_id, 60).await
}

pub async fn fetch_results(
    client: &reqwest::Client,
    base_url: &str,
    job_id: &str,
) -> Result<ResultsResponse, Box<dyn std::error::Error + Send + Sync>> {
    let response = client
        .get(format!("{}/results", base_url))
        .query(&[("jobId", job_id)])
        .send()
        .await?;

    if !response.status().is_success() {
        let error_text = response.text().await?;
        return Err(format!("Results fetch failed: {}", error_text).into());
    }

    Ok(response.json::<ResultsResponse>().await?)
}

/// Assert that recorded results match the fixtures they were submitted from
pub fn assert_results_match(results: &ResultsResponse, fixtures: &[ItemFixture]) {
    assert_eq!(results.results_count, fixtures.len());

    let mut expected: Vec<_> = fixtures.to_vec();
    expected.sort_by_key(|f| f.item_id);

    for (result, fixture) in results.results.iter().zip(&expected) {
        assert_eq!(result.item_id, fixture.item_id, "results must be sorted by item id");
        assert_eq!(
            result.is_valid, fixture.expect_valid,
            "validity mismatch for item {}",
            fixture.item_id
        );
        assert_eq!(
            result.processed_data["enrichment"]["category"], fixture.expect_category,
            "category mismatch for item {}",
            fixture.item_id
        );
        assert_eq!(result.fingerprint.len(), 64);

        println!("  ✓ item {} - valid: {}", result.item_id, result.is_valid);
    }
}
