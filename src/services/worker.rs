use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::sleep;

use crate::models::item::{ItemMessage, ATTR_ITEM_ID, ATTR_JOB_ID};
use crate::models::result::ItemResult;
use crate::services::idempotency::ProcessedCache;
use crate::services::jobs;
use crate::services::processor::{ItemProcessor, ProcessingError};
use crate::services::queue::{Delivery, QueueError, QueueMessage, WorkQueue};
use crate::services::store::{JobStore, RecordOutcome, ResultStore, StoreError};

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            poll_interval: Duration::from_millis(1000),
            cache_capacity: 10_000,
            cache_ttl: Duration::from_secs(900),
        }
    }
}

/// What happened to a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Processed and counted towards the job.
    Processed { is_valid: bool },
    /// Skipped: this worker already finished the item recently.
    CachedDuplicate,
    /// Skipped: a result for the item was already recorded.
    AlreadyRecorded,
}

/// Tally of a batch that was settled without a processing failure.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: usize,
    pub skipped: usize,
    pub dead_lettered: usize,
}

/// Consumes item messages and records one result per item.
pub struct Worker {
    jobs: Arc<dyn JobStore>,
    results: Arc<dyn ResultStore>,
    queue: Arc<dyn WorkQueue>,
    processor: ItemProcessor,
    cache: ProcessedCache,
    options: WorkerOptions,
}

impl Worker {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        results: Arc<dyn ResultStore>,
        queue: Arc<dyn WorkQueue>,
        processor: ItemProcessor,
        options: WorkerOptions,
    ) -> Self {
        let cache = ProcessedCache::new(options.cache_capacity, options.cache_ttl);
        Self {
            jobs,
            results,
            queue,
            processor,
            cache,
            options,
        }
    }

    /// Handle one message: process the item, record its result, count it and
    /// check whether the job is done.
    ///
    /// The result record and the counter move together in one store call, so
    /// a redelivered message never counts twice and a failed write leaves
    /// nothing behind for the retry to trip over.
    pub async fn handle_message(&self, message: &QueueMessage) -> Result<MessageOutcome, WorkerError> {
        let ItemMessage { job_id, item } =
            serde_json::from_str(&message.body).map_err(|source| WorkerError::Malformed {
                message_id: message.message_id.clone(),
                source,
            })?;

        tracing::info!(
            job_id = %job_id,
            item_id = %item.item_id,
            message_id = %message.message_id,
            "Processing queued item"
        );

        if self.cache.contains(&job_id, &item.item_id) {
            tracing::info!(job_id = %job_id, item_id = %item.item_id, "Item already processed (cache)");
            metrics::counter!("items_skipped_total", "reason" => "cache").increment(1);
            return Ok(MessageOutcome::CachedDuplicate);
        }

        if self.jobs.get_job(&job_id).await?.is_none() {
            return Err(WorkerError::UnknownJob(job_id));
        }

        let started = Instant::now();
        let processed = self.processor.process(&item)?;

        let result = ItemResult {
            job_id: job_id.clone(),
            item_id: processed.item_id,
            item_type: processed.item_type,
            fingerprint: processed.fingerprint,
            duration_ms: processed.duration_ms,
            is_valid: processed.is_valid,
            processed_data: processed.processed_data,
            processed_at: Utc::now(),
        };

        let job = match self.results.record_result(&result).await? {
            RecordOutcome::Counted(job) => job,
            RecordOutcome::AlreadyRecorded => {
                tracing::info!(job_id = %job_id, item_id = %item.item_id, "Result already recorded, not counting again");
                metrics::counter!("items_skipped_total", "reason" => "recorded").increment(1);
                self.cache.insert(&job_id, &item.item_id);
                jobs::check_completion(self.jobs.as_ref(), &job_id).await?;
                return Ok(MessageOutcome::AlreadyRecorded);
            }
        };
        self.cache.insert(&job_id, &item.item_id);

        metrics::histogram!("item_processing_seconds").record(started.elapsed().as_secs_f64());
        metrics::counter!(
            "items_processed_total",
            "valid" => if result.is_valid { "true" } else { "false" }
        )
        .increment(1);

        tracing::info!(
            job_id = %job_id,
            item_id = %item.item_id,
            fingerprint = %result.fingerprint,
            duration_ms = result.duration_ms,
            is_valid = result.is_valid,
            processed_items = job.processed_items,
            total_items = job.total_items,
            "Item processed and recorded"
        );

        jobs::check_completion(self.jobs.as_ref(), &job_id).await?;

        Ok(MessageOutcome::Processed {
            is_valid: result.is_valid,
        })
    }

    /// Settle a batch of deliveries in order.
    ///
    /// An undecodable message is dead-lettered on its own and its siblings go
    /// on. Any other failure nacks the failing message together with every
    /// sibling not yet handled, and fails the batch.
    pub async fn process_batch(&self, deliveries: Vec<Delivery>) -> Result<BatchReport, WorkerError> {
        let mut report = BatchReport::default();
        let mut remaining = deliveries.into_iter();

        while let Some(delivery) = remaining.next() {
            match self.handle_message(&delivery.message).await {
                Ok(outcome) => {
                    self.queue.ack(&delivery).await?;
                    match outcome {
                        MessageOutcome::Processed { .. } => report.processed += 1,
                        _ => report.skipped += 1,
                    }
                }
                Err(e @ WorkerError::Malformed { .. }) => {
                    tracing::error!(error = %e, "Dead-lettering undecodable message");
                    metrics::counter!("items_dead_lettered_total").increment(1);
                    self.queue.dead_letter(&delivery).await?;
                    report.dead_lettered += 1;
                }
                Err(e) => {
                    tracing::error!(
                        message_id = %delivery.message.message_id,
                        job_id = delivery.message.attribute(ATTR_JOB_ID).unwrap_or_default(),
                        item_id = delivery.message.attribute(ATTR_ITEM_ID).unwrap_or_default(),
                        receive_count = delivery.message.receive_count,
                        error = %e,
                        "Item processing failed, returning message to the queue"
                    );
                    metrics::counter!("items_failed_total").increment(1);
                    self.queue.nack(&delivery).await?;

                    let mut abandoned = 0;
                    for sibling in remaining {
                        self.queue.nack(&sibling).await?;
                        abandoned += 1;
                    }
                    if abandoned > 0 {
                        tracing::warn!(abandoned, "Unprocessed siblings returned to the queue");
                    }

                    return Err(e);
                }
            }
        }

        Ok(report)
    }

    /// Receive and settle one batch. Returns the number of messages received.
    pub async fn poll_once(&self) -> Result<usize, WorkerError> {
        let deliveries = self.queue.receive(self.options.batch_size).await?;
        if deliveries.is_empty() {
            return Ok(0);
        }

        let received = deliveries.len();
        let report = self.process_batch(deliveries).await?;
        tracing::debug!(
            received,
            processed = report.processed,
            skipped = report.skipped,
            dead_lettered = report.dead_lettered,
            "Batch settled"
        );

        if let Ok(depth) = self.queue.depth().await {
            metrics::gauge!("queue_depth").set(depth as f64);
        }

        Ok(received)
    }

    /// Poll until `shutdown` flips to `true`. The batch in hand is always
    /// settled before the loop exits.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(batch_size = self.options.batch_size, "Worker loop started");

        while !*shutdown.borrow() {
            match self.poll_once().await {
                Ok(0) => {
                    tracing::trace!("No messages available, sleeping");
                    tokio::select! {
                        _ = sleep(self.options.poll_interval) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                Ok(received) => {
                    tracing::debug!(received, "Batch handled, polling again");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Batch failed, backing off");
                    tokio::select! {
                        _ = sleep(self.options.poll_interval) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }

        tracing::info!("Worker loop stopped");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Malformed message {message_id}: {source}")]
    Malformed {
        message_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Job {0} does not exist")]
    UnknownJob(String),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}
