//! Per-client sliding-window rate limiting
//!
//! Each client identifier keeps the ordered timestamps of its admitted
//! requests within the trailing window. Stale timestamps are pruned lazily
//! on each check; there is no background sweep. The whole table sits behind
//! one mutex, which keeps the check-then-append atomic per key under
//! concurrent requests, and the table itself is an LRU so the number of
//! distinct client keys stays bounded under client churn.
//!
//! State is in-memory and per-process: it resets on restart and is not
//! coordinated across replicas.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

/// Sliding-window rate limiter keyed by client identifier.
pub struct SlidingWindow {
    table: Mutex<LruCache<String, Vec<i64>>>,
    max_requests: usize,
    window_ms: i64,
}

impl SlidingWindow {
    /// Create a limiter admitting `max_requests` per `window_ms` per client,
    /// tracking at most `max_clients` distinct client identifiers.
    pub fn new(max_requests: u32, window_ms: u64, max_clients: usize) -> Self {
        let cap = NonZeroUsize::new(max_clients.max(1)).expect("max(1) is non-zero");
        Self {
            table: Mutex::new(LruCache::new(cap)),
            max_requests: max_requests as usize,
            window_ms: window_ms as i64,
        }
    }

    /// Check whether a request from `client_id` at `now_ms` is admitted.
    ///
    /// Returns `Err(retry_after)` when the client is over its limit; the
    /// duration is how long until the oldest in-window request ages out.
    /// Denied requests are not recorded.
    pub fn check(&self, client_id: &str, now_ms: i64) -> Result<(), Duration> {
        let mut table = self.table.lock().expect("rate limit table poisoned");

        if let Some(timestamps) = table.get_mut(client_id) {
            timestamps.retain(|&t| now_ms - t < self.window_ms);

            if timestamps.len() >= self.max_requests {
                let oldest = timestamps[0];
                let remaining_ms = (oldest + self.window_ms - now_ms).max(0) as u64;
                // Round up to whole seconds, at least one.
                let secs = remaining_ms.div_ceil(1000).max(1);
                return Err(Duration::from_secs(secs));
            }

            timestamps.push(now_ms);
        } else {
            table.put(client_id.to_string(), vec![now_ms]);
        }

        Ok(())
    }

    /// Number of client identifiers currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.table.lock().expect("rate limit table poisoned").len()
    }
}
