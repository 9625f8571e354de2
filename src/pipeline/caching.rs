//! Synchronous memoization of a pipeline's output.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, instrument, warn};

use crate::caching::keys::{CompoundKey, ExpiresKey};
use crate::caching::{Cache, CacheKey, CacheValue, LastModified};

use super::component::{Parameters, PipelineComponent, Sink};
use super::chain::{Lifecycle, Pipeline};
use super::error::{PipelineError, ProcessingError, SetupError};
use super::options::{Configuration, PipelineOptions};
use super::sink::CachingSink;

/// A [`Pipeline`] whose output is stored under a key built from its stages.
///
/// On a hit the stored bytes are replayed into the sink and no stage runs.
/// On a miss the chain runs with a write-through sink and the captured output
/// is stored once the run succeeds. Without a cache every run executes the chain.
pub struct CachingPipeline<E> {
    pub(crate) pipeline: Pipeline<E>,
    cache: Option<Arc<dyn Cache>>,
    options: PipelineOptions,
    cache_key: Option<CacheKey>,
    pub(crate) sink: Option<CachingSink>,
}

impl<E: 'static> CachingPipeline<E> {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self::with_optional_cache(Some(cache))
    }

    pub fn without_cache() -> Self {
        Self::with_optional_cache(None)
    }

    fn with_optional_cache(cache: Option<Arc<dyn Cache>>) -> Self {
        Self {
            pipeline: Pipeline::new(),
            cache,
            options: PipelineOptions::default(),
            cache_key: None,
            sink: None,
        }
    }

    pub fn set_cache(&mut self, cache: Option<Arc<dyn Cache>>) {
        self.cache = cache;
    }

    pub fn set_options(&mut self, options: PipelineOptions) {
        self.options = options;
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Read pipeline options from `config` and pass it on to every stage.
    pub fn configure(&mut self, config: &Configuration) -> Result<(), SetupError> {
        self.options = PipelineOptions::from_map(config)?;
        self.pipeline.configure(config);
        Ok(())
    }

    pub fn add_component<C>(&mut self, component: C) -> Result<(), SetupError>
    where
        C: PipelineComponent<E> + 'static,
    {
        self.pipeline.add_component(component)
    }

    /// Set up the chain and compute its key. Any failure leaves the pipeline
    /// in [`Lifecycle::Building`] without an output, so it refuses to execute.
    pub fn setup(&mut self, sink: Sink, parameters: &mut Parameters) -> Result<(), SetupError> {
        let sink = CachingSink::new(sink);
        self.pipeline.setup(Box::new(sink.clone()), parameters)?;

        match self.construct_cache_key() {
            Ok(key) => {
                self.cache_key = key;
                self.sink = Some(sink);
                Ok(())
            }
            Err(err) => {
                self.pipeline.abandon_setup();
                self.cache_key = None;
                self.sink = None;
                Err(err)
            }
        }
    }

    pub fn state(&self) -> Lifecycle {
        self.pipeline.state()
    }

    /// Key computed at setup, `None` when some stage cannot be cached.
    pub fn cache_key(&self) -> Option<&CacheKey> {
        self.cache_key.as_ref()
    }

    pub fn last_modified(&self) -> LastModified {
        self.cache_key
            .as_ref()
            .map_or(LastModified::Unknown, CacheKey::last_modified)
    }

    pub fn content_type(&self) -> Option<String> {
        self.pipeline.content_type()
    }

    #[instrument(skip_all, fields(key = tracing::field::Empty))]
    pub fn execute(&mut self) -> Result<(), PipelineError> {
        let sink = self.caching_sink()?;
        let key = self.cache_key.clone();
        if let Some(key) = &key {
            tracing::Span::current().record("key", tracing::field::display(key));
        }

        if let Some(key) = &key
            && let Some(value) = self.lookup(key, false)
        {
            debug!(outcome = "hit", "Replaying cached value");
            self.replay(&sink, &value)?;
            self.pipeline.mark_executed();
            return Ok(());
        }

        debug!(outcome = "miss", "Running pipeline");
        self.run_and_store(&sink, key.as_ref())
    }

    pub(crate) fn caching_sink(&self) -> Result<CachingSink, SetupError> {
        match (&self.sink, self.pipeline.state()) {
            (Some(sink), Lifecycle::SetUp | Lifecycle::Executed) => Ok(sink.clone()),
            _ => Err(SetupError::NotSetUp),
        }
    }

    pub(crate) fn set_cache_key(&mut self, key: Option<CacheKey>) {
        self.cache_key = key;
    }

    /// Build the key from every stage's fragment, in chain order.
    pub(crate) fn construct_cache_key(&self) -> Result<Option<CacheKey>, SetupError> {
        let mut fragments = CompoundKey::new();

        for stage in self.pipeline.stages() {
            let fragment = stage
                .lock("construct_cache_key")
                .as_caching()
                .and_then(|component| component.construct_cache_key());

            match fragment {
                Some(fragment) => {
                    debug!(component = %stage.name(), key = %fragment, "Adding key fragment");
                    fragments.push(fragment);
                }
                None => return self.expires_fallback(stage.name()),
            }
        }

        let key = CacheKey::Compound(fragments);
        Ok(Some(match self.options.ttl() {
            Some(ttl) => ExpiresKey::new(key, ttl).into(),
            None => key,
        }))
    }

    fn expires_fallback(&self, component: &str) -> Result<Option<CacheKey>, SetupError> {
        let Some(ttl) = self.options.ttl() else {
            debug!(component, "Component is not cacheable, caching disabled for this run");
            return Ok(None);
        };

        let seed = self
            .options
            .expires_cache_key
            .clone()
            .ok_or(SetupError::MissingExpiresCacheKey)?;
        debug!(component, seed = %seed, "Component is not cacheable, falling back to expiry");
        Ok(Some(ExpiresKey::new(CacheKey::invalid(seed), ttl).into()))
    }

    /// Stored value for `key`; invalid values only with `include_invalid`.
    pub(crate) fn lookup(
        &self,
        key: &CacheKey,
        include_invalid: bool,
    ) -> Option<Arc<CacheValue>> {
        let Some(cache) = &self.cache else {
            warn!("Caching pipeline has no cache configured, falling back to non-caching behavior");
            return None;
        };

        let value = cache.get_with(key, include_invalid);
        match &value {
            Some(value) => debug!(value = %value, "Found cached value"),
            None => debug!("No cached value"),
        }
        value
    }

    pub(crate) fn store(&self, key: &CacheKey, bytes: Bytes) {
        let Some(cache) = &self.cache else {
            warn!("Caching pipeline has no cache configured, result not stored");
            return;
        };

        let value = CacheValue::complete(key.clone(), bytes).in_group(self.options.group());
        debug!(value = %value, "Storing pipeline result");
        cache.put(key.clone(), value);
    }

    pub(crate) fn replay(
        &self,
        sink: &CachingSink,
        value: &CacheValue,
    ) -> Result<(), ProcessingError> {
        sink.with_inner(|out| value.write_to(out))?;
        Ok(())
    }

    pub(crate) fn run_and_store(
        &mut self,
        sink: &CachingSink,
        key: Option<&CacheKey>,
    ) -> Result<(), PipelineError> {
        sink.reset();
        self.pipeline.execute()?;

        let output = sink.take();
        if let Some(key) = key {
            self.store(key, output);
        }
        Ok(())
    }
}
