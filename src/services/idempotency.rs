use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Process-local record of (job_id, item_id) pairs this worker already finished.
///
/// Best effort only: it is bounded, entries expire after `ttl`, and nothing
/// is shared between worker processes. Durable deduplication is the result
/// store's conditional write.
pub struct ProcessedCache {
    entries: Mutex<LruCache<(String, String), Instant>>,
    ttl: Duration,
}

impl ProcessedCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    pub fn contains(&self, job_id: &str, item_id: &str) -> bool {
        let key = (job_id.to_string(), item_id.to_string());
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let fresh = entries
            .get(&key)
            .map(|recorded_at| recorded_at.elapsed() < self.ttl);

        match fresh {
            Some(true) => true,
            Some(false) => {
                entries.pop(&key);
                false
            }
            None => false,
        }
    }

    pub fn insert(&self, job_id: &str, item_id: &str) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.put((job_id.to_string(), item_id.to_string()), Instant::now());
    }

    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
