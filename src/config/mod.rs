use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string (jobs and item results)
    pub database_url: String,

    /// Redis connection string for the work queue
    pub redis_url: String,

    /// HS256 secret used to verify caller tokens
    pub jwt_secret: String,

    /// Base Redis key of the work queue
    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    /// Deliveries of a failing message before it is dead-lettered
    #[serde(default = "default_max_receive_count")]
    pub max_receive_count: u32,

    #[serde(default = "default_worker_batch_size")]
    pub worker_batch_size: usize,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_idempotency_cache_capacity")]
    pub idempotency_cache_capacity: usize,

    #[serde(default = "default_idempotency_cache_ttl_secs")]
    pub idempotency_cache_ttl_secs: u64,

    /// Scrape address of the worker's Prometheus endpoint
    #[serde(default = "default_worker_metrics_addr")]
    pub worker_metrics_addr: String,

    /// Request body limit in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_queue_name() -> String {
    "job_fanout:items".to_string()
}

fn default_max_receive_count() -> u32 {
    3
}

fn default_worker_batch_size() -> usize {
    10
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_idempotency_cache_capacity() -> usize {
    10_000
}

fn default_idempotency_cache_ttl_secs() -> u64 {
    900
}

fn default_worker_metrics_addr() -> String {
    "0.0.0.0:9091".to_string()
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn idempotency_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.idempotency_cache_ttl_secs)
    }
}
