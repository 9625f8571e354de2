//! Background refresh scheduling with per-key single flight.
//!
//! Jobs run on the blocking pool of a private runtime. A key stays pending
//! from submission until its job returns, fails or panics; a second request
//! for a pending key is dropped.

use std::num::NonZeroUsize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use metrics::{counter, histogram};
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, error, info, warn};

use super::error::CacheError;
use super::keys::CacheKey;
use super::lock::lock;

const SOURCE: &str = "caching::refresh";

pub const DEFAULT_REFRESH_THREADS: NonZeroUsize = match NonZeroUsize::new(50) {
    Some(threads) => threads,
    None => NonZeroUsize::MIN,
};

pub const METRIC_REFRESH_SCHEDULED: &str = "cachepipe_refresh_scheduled_total";
pub const METRIC_REFRESH_DEDUPLICATED: &str = "cachepipe_refresh_deduplicated_total";
pub const METRIC_REFRESH_FAILED: &str = "cachepipe_refresh_failed_total";
pub const METRIC_REFRESH_MS: &str = "cachepipe_refresh_ms";

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Work that recomputes and stores the value for a key.
pub trait RefreshJob: Send + Sync {
    fn refresh(&self, key: &CacheKey) -> Result<(), BoxError>;
}

pub struct CacheRefreshManager {
    pending: Arc<DashMap<CacheKey, ()>>,
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
    closed: AtomicBool,
    threads: NonZeroUsize,
}

impl CacheRefreshManager {
    pub fn new(threads: NonZeroUsize) -> Result<Self, CacheError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(threads.get())
            .thread_name("cachepipe-refresh")
            .build()?;

        Ok(Self {
            pending: Arc::new(DashMap::new()),
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            closed: AtomicBool::new(false),
            threads,
        })
    }

    pub fn threads(&self) -> NonZeroUsize {
        self.threads
    }

    /// Schedule `job` to refresh `key` unless a refresh for it is already pending.
    pub fn refresh_cache_value(&self, key: CacheKey, job: Arc<dyn RefreshJob>) {
        if self.closed.load(Ordering::Acquire) {
            warn!(key = %key, "Refresh manager is shut down, dropping refresh");
            return;
        }

        let guard = match self.pending.entry(key.clone()) {
            Entry::Occupied(_) => {
                debug!(key = %key, "Refresh already scheduled");
                counter!(METRIC_REFRESH_DEDUPLICATED).increment(1);
                return;
            }
            Entry::Vacant(vacant) => {
                vacant.insert(());
                PendingGuard {
                    key: key.clone(),
                    pending: Arc::clone(&self.pending),
                }
            }
        };

        counter!(METRIC_REFRESH_SCHEDULED).increment(1);
        debug!(key = %key, "Scheduled cache refresh");

        self.handle.spawn_blocking(move || {
            let _guard = guard;
            run_job(&key, job.as_ref());
        });
    }

    pub fn is_pending(&self, key: &CacheKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Block until no refresh is pending or `timeout` elapses. Returns whether it went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.pending.is_empty() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        true
    }

    /// Stop accepting refreshes and wait up to `timeout` for running ones.
    pub fn shutdown(&self, timeout: Duration) {
        self.closed.store(true, Ordering::Release);
        if let Some(runtime) = lock(&self.runtime, SOURCE, "shutdown").take() {
            info!(pending = self.pending.len(), "Shutting down refresh pool");
            runtime.shutdown_timeout(timeout);
        }
    }
}

impl Drop for CacheRefreshManager {
    fn drop(&mut self) {
        // The last owner may be a refresh job running on this very runtime.
        if let Some(runtime) = lock(&self.runtime, SOURCE, "drop").take() {
            runtime.shutdown_background();
        }
    }
}

fn run_job(key: &CacheKey, job: &dyn RefreshJob) {
    let started_at = Instant::now();
    let outcome = catch_unwind(AssertUnwindSafe(|| job.refresh(key)));
    let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;

    let result = match outcome {
        Ok(Ok(())) => {
            debug!(key = %key, elapsed_ms, "Cache refresh complete");
            "ok"
        }
        Ok(Err(err)) => {
            warn!(key = %key, error = %err, elapsed_ms, "Cache refresh failed");
            counter!(METRIC_REFRESH_FAILED, "reason" => "error").increment(1);
            "error"
        }
        Err(_) => {
            error!(key = %key, elapsed_ms, "Cache refresh panicked");
            counter!(METRIC_REFRESH_FAILED, "reason" => "panic").increment(1);
            "panic"
        }
    };

    histogram!(METRIC_REFRESH_MS, "result" => result).record(elapsed_ms);
}

/// Clears the pending mark for a key when the refresh task ends, however it ends.
struct PendingGuard {
    key: CacheKey,
    pending: Arc<DashMap<CacheKey, ()>>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.remove(&self.key);
    }
}
