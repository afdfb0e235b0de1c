//! In-process implementations of the store and queue traits.
//!
//! These back the test suites and single-process local runs. All state lives
//! behind one mutex per structure. `record_result` takes the results lock and
//! then the jobs lock, so recording and counting are atomic with respect to
//! concurrent callers; no other operation holds both.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::models::job::{Job, JobStatus};
use crate::models::result::ItemResult;
use crate::services::queue::{Delivery, OutgoingMessage, QueueError, QueueMessage, WorkQueue};
use crate::services::store::{JobStore, RecordOutcome, ResultStore, StoreError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Job and result store held in memory.
#[derive(Default)]
pub struct InMemoryStore {
    jobs: Mutex<HashMap<String, Job>>,
    results: Mutex<BTreeMap<(String, String), ItemResult>>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the backend were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for InMemoryStore {
    async fn create_job(&self, job: &Job) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut jobs = lock(&self.jobs);
        if jobs.contains_key(&job.job_id) {
            return Err(StoreError::AlreadyExists(job.job_id.clone()));
        }
        jobs.insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        self.ensure_available()?;
        Ok(lock(&self.jobs).get(job_id).cloned())
    }

    async fn advance_status(&self, job_id: &str, status: JobStatus) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let mut jobs = lock(&self.jobs);
        match jobs.get_mut(job_id) {
            Some(job) if job.status.can_advance_to(status) => {
                job.status = status;
                job.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.ensure_available()
    }
}

#[async_trait]
impl ResultStore for InMemoryStore {
    async fn record_result(&self, result: &ItemResult) -> Result<RecordOutcome, StoreError> {
        self.ensure_available()?;
        let key = (result.job_id.clone(), result.item_id.clone());
        let mut results = lock(&self.results);
        if results.contains_key(&key) {
            return Ok(RecordOutcome::AlreadyRecorded);
        }

        let mut jobs = lock(&self.jobs);
        let job = jobs
            .get_mut(&result.job_id)
            .ok_or_else(|| StoreError::JobNotFound(result.job_id.clone()))?;

        if job.processed_items < job.total_items {
            job.processed_items += 1;
            job.updated_at = Utc::now();
        }
        let job = job.clone();

        results.insert(key, result.clone());
        Ok(RecordOutcome::Counted(job))
    }

    async fn results_for_job(&self, job_id: &str) -> Result<Vec<ItemResult>, StoreError> {
        self.ensure_available()?;
        Ok(lock(&self.results)
            .values()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<QueueMessage>,
    in_flight: HashMap<String, QueueMessage>,
    dead: Vec<QueueMessage>,
}

/// FIFO work queue held in memory, with the same receive-limit semantics as
/// the Redis queue. Receipts are message ids.
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
    max_receive_count: u32,
    unavailable: AtomicBool,
}

impl InMemoryQueue {
    pub fn new(max_receive_count: u32) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            max_receive_count: max_receive_count.max(1),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Enqueue a message with an arbitrary body, bypassing `publish`.
    pub fn push_raw(&self, body: &str) -> String {
        let message = QueueMessage::from_outgoing(&OutgoingMessage::new(body.to_string()));
        let id = message.message_id.clone();
        lock(&self.state).ready.push_back(message);
        id
    }

    /// Snapshot of the messages waiting to be received.
    pub fn pending(&self) -> Vec<QueueMessage> {
        lock(&self.state).ready.iter().cloned().collect()
    }

    pub fn in_flight_len(&self) -> usize {
        lock(&self.state).in_flight.len()
    }

    pub fn dead_letters(&self) -> Vec<QueueMessage> {
        lock(&self.state).dead.clone()
    }

    fn ensure_available(&self) -> Result<(), QueueError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable("in-memory queue disabled".to_string()));
        }
        Ok(())
    }

    fn take_in_flight(state: &mut QueueState, receipt: &str) -> Result<QueueMessage, QueueError> {
        state
            .in_flight
            .remove(receipt)
            .ok_or_else(|| QueueError::Unavailable(format!("unknown receipt {receipt}")))
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new(3)
    }
}

#[async_trait]
impl WorkQueue for InMemoryQueue {
    async fn publish(&self, message: &OutgoingMessage) -> Result<String, QueueError> {
        self.ensure_available()?;
        let envelope = QueueMessage::from_outgoing(message);
        let id = envelope.message_id.clone();
        lock(&self.state).ready.push_back(envelope);
        Ok(id)
    }

    async fn receive(&self, max: usize) -> Result<Vec<Delivery>, QueueError> {
        self.ensure_available()?;
        let mut state = lock(&self.state);
        let mut deliveries = Vec::new();

        while deliveries.len() < max {
            let Some(message) = state.ready.pop_front() else { break };
            state
                .in_flight
                .insert(message.message_id.clone(), message.clone());
            deliveries.push(Delivery {
                receipt: message.message_id.clone(),
                message,
            });
        }

        Ok(deliveries)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.ensure_available()?;
        let mut state = lock(&self.state);
        Self::take_in_flight(&mut state, &delivery.receipt)?;
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.ensure_available()?;
        let mut state = lock(&self.state);
        let mut message = Self::take_in_flight(&mut state, &delivery.receipt)?;
        message.receive_count += 1;

        if message.receive_count >= self.max_receive_count {
            state.dead.push(message);
        } else {
            state.ready.push_back(message);
        }
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.ensure_available()?;
        let mut state = lock(&self.state);
        let message = Self::take_in_flight(&mut state, &delivery.receipt)?;
        state.dead.push(message);
        Ok(())
    }

    async fn depth(&self) -> Result<u64, QueueError> {
        self.ensure_available()?;
        Ok(lock(&self.state).ready.len() as u64)
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        self.ensure_available()
    }
}
