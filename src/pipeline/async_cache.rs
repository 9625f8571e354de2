//! Stale-while-revalidate on top of [`CachingPipeline`].

use std::sync::{Arc, Mutex};

use tracing::{debug, instrument};

use crate::caching::lock::lock;
use crate::caching::{BoxError, CacheKey, CacheRefreshManager, LastModified, RefreshJob};

use super::caching::CachingPipeline;
use super::error::PipelineError;
use super::sink::CachingSink;

const SOURCE: &str = "pipeline::async_cache";

/// Serves whatever is stored, valid or not, and refreshes stale entries in the background.
///
/// Only a request that finds nothing stored runs the chain on the caller's
/// thread. A background refresh holds the pipeline for its duration, so
/// further runs of the same instance wait for it; other pipelines sharing the
/// cache keep receiving the stale value until the refresh commits.
pub struct AsyncCachePipeline<E> {
    shared: Arc<Shared<E>>,
}

struct Shared<E> {
    pipeline: Mutex<CachingPipeline<E>>,
    refresher: Arc<CacheRefreshManager>,
}

impl<E: 'static> AsyncCachePipeline<E> {
    /// Wrap an assembled pipeline.
    pub fn new(pipeline: CachingPipeline<E>, refresher: Arc<CacheRefreshManager>) -> Self {
        Self {
            shared: Arc::new(Shared {
                pipeline: Mutex::new(pipeline),
                refresher,
            }),
        }
    }

    pub fn refresher(&self) -> &Arc<CacheRefreshManager> {
        &self.shared.refresher
    }

    pub fn cache_key(&self) -> Option<CacheKey> {
        self.shared.pipeline().cache_key().cloned()
    }

    pub fn last_modified(&self) -> LastModified {
        self.shared.pipeline().last_modified()
    }

    pub fn content_type(&self) -> Option<String> {
        self.shared.pipeline().content_type()
    }

    #[instrument(skip_all)]
    pub fn execute(&self) -> Result<(), PipelineError> {
        let mut pipeline = self.shared.pipeline();
        let sink = pipeline.caching_sink()?;

        let key = pipeline.construct_cache_key()?;
        pipeline.set_cache_key(key.clone());

        if let Some(key) = &key
            && let Some(value) = pipeline.lookup(key, true)
        {
            pipeline.replay(&sink, &value)?;
            pipeline.pipeline.mark_executed();

            if value.is_valid(key) {
                debug!(key = %key, outcome = "hit", "Replayed cached value");
            } else {
                debug!(key = %key, outcome = "stale", "Replayed stale value, scheduling refresh");
                let job: Arc<dyn RefreshJob> = Arc::clone(&self.shared) as Arc<dyn RefreshJob>;
                self.shared.refresher.refresh_cache_value(key.clone(), job);
            }
            return Ok(());
        }

        debug!(outcome = "miss", "Nothing stored, running pipeline");
        pipeline.run_and_store(&sink, key.as_ref())
    }
}

impl<E> Shared<E> {
    fn pipeline(&self) -> std::sync::MutexGuard<'_, CachingPipeline<E>> {
        lock(&self.pipeline, SOURCE, "pipeline")
    }
}

impl<E: 'static> RefreshJob for Shared<E> {
    /// Run the chain into a private buffer and store the result under `key`.
    fn refresh(&self, key: &CacheKey) -> Result<(), BoxError> {
        let pipeline = self.pipeline();
        let sink = pipeline.caching_sink()?;

        let buffer = CachingSink::detached();
        pipeline.pipeline.attach_output(Box::new(buffer.clone()));
        let result = pipeline.pipeline.run();
        pipeline.pipeline.attach_output(Box::new(sink));

        result?;
        pipeline.store(key, buffer.take());
        debug!(key = %key, "Refreshed cached value");
        Ok(())
    }
}
