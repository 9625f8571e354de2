//! Stage contract.
//!
//! A stage implements [`PipelineComponent`] plus any subset of the capability
//! traits, and reports which ones through the `as_*` queries. The pipeline
//! only ever talks to stages through those queries.

use std::any::Any;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::caching::keys::{NON_CACHEABLE_PARAMETERS, ParameterKey};
use crate::caching::{CacheKey, lock::lock};

use super::error::StageError;
use super::options::Configuration;

const SOURCE: &str = "pipeline::component";

/// Byte sink a finisher writes the pipeline output to.
pub type Sink = Box<dyn Write + Send>;

pub const RUN_ID: &str = "pipeline.run-id";

pub trait PipelineComponent<E>: Send {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Receive configuration before the pipeline is assembled.
    fn configure(&mut self, _config: &Configuration) {}

    /// Called once while the pipeline is set up, in chain order.
    fn setup(&mut self, _parameters: &mut Parameters) -> Result<(), StageError> {
        Ok(())
    }

    /// Called exactly once at the end of every run, whatever its outcome.
    fn finish(&mut self) {}

    fn as_starter(&mut self) -> Option<&mut dyn Starter> {
        None
    }

    fn as_finisher(&mut self) -> Option<&mut dyn Finisher> {
        None
    }

    fn as_producer(&mut self) -> Option<&mut dyn Producer<E>> {
        None
    }

    fn as_consumer(&mut self) -> Option<&mut dyn Consumer<E>> {
        None
    }

    fn as_caching(&self) -> Option<&dyn CachingComponent> {
        None
    }
}

/// First stage of a chain; drives a run.
pub trait Starter {
    fn execute(&mut self) -> Result<(), StageError>;
}

/// Last stage of a chain; owns the output sink.
pub trait Finisher {
    fn content_type(&self) -> &str;

    fn set_output(&mut self, sink: Sink);
}

pub trait Producer<E> {
    /// Accept `next` as the receiver of produced events, or reject it.
    fn set_consumer(&mut self, next: Link<E>) -> Result<(), StageError>;
}

pub trait Consumer<E> {
    fn consume(&mut self, event: E) -> Result<(), StageError>;
}

pub trait CachingComponent {
    /// Key fragment describing this stage's contribution, `None` when uncacheable.
    fn construct_cache_key(&self) -> Option<CacheKey>;
}

/// A stage as held by a pipeline.
pub struct Stage<E> {
    name: Arc<str>,
    component: Arc<Mutex<dyn PipelineComponent<E>>>,
}

impl<E: 'static> Stage<E> {
    pub(crate) fn new<C>(component: C) -> Self
    where
        C: PipelineComponent<E> + 'static,
    {
        let name = Arc::from(component.name());
        Self {
            name,
            component: Arc::new(Mutex::new(component)),
        }
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub(crate) fn lock(
        &self,
        op: &'static str,
    ) -> MutexGuard<'_, dyn PipelineComponent<E> + 'static> {
        lock(&self.component, SOURCE, op)
    }

    pub(crate) fn link(&self) -> Link<E> {
        Link {
            name: Arc::clone(&self.name),
            target: Arc::clone(&self.component),
        }
    }
}

/// Handle a producer pushes events through to the next stage.
pub struct Link<E> {
    name: Arc<str>,
    target: Arc<Mutex<dyn PipelineComponent<E>>>,
}

impl<E> Link<E> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deliver `event` to the next stage, blocking until it has been consumed.
    pub fn push(&self, event: E) -> Result<(), StageError> {
        let mut target = lock(&self.target, SOURCE, "push");
        let Some(consumer) = target.as_consumer() else {
            return Err(StageError::downstream(
                Arc::clone(&self.name),
                StageError::failed("linked stage does not consume events"),
            ));
        };
        consumer
            .consume(event)
            .map_err(|err| StageError::downstream(Arc::clone(&self.name), err))
    }
}

impl<E> Clone for Link<E> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            target: Arc::clone(&self.target),
        }
    }
}

impl<E> std::fmt::Debug for Link<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link").field("name", &self.name).finish()
    }
}

#[derive(Clone)]
pub enum ParamValue {
    Text(String),
    Object(Arc<dyn Any + Send + Sync>),
}

impl std::fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Object(_) => f.write_str("Object(..)"),
        }
    }
}

/// Parameters shared by every stage of one run.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    entries: BTreeMap<String, ParamValue>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters tagged with a fresh `pipeline.run-id`.
    pub fn for_run() -> Self {
        let mut parameters = Self::new();
        parameters.insert_text(RUN_ID, Uuid::new_v4().to_string());
        parameters
    }

    pub fn insert_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries
            .insert(name.into(), ParamValue::Text(value.into()));
    }

    pub fn insert_object<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.entries
            .insert(name.into(), ParamValue::Object(Arc::new(value)));
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.entries.get(name)? {
            ParamValue::Text(text) => Some(text.as_str()),
            ParamValue::Object(_) => None,
        }
    }

    pub fn object<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        match self.entries.get(name)? {
            ParamValue::Object(object) => Arc::clone(object).downcast::<T>().ok(),
            ParamValue::Text(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key over the text parameters, leaving out per-run plumbing.
    pub fn cache_key(&self) -> ParameterKey {
        let texts = self.entries.iter().filter_map(|(name, value)| match value {
            ParamValue::Text(text) => Some((name.as_str(), text.as_str())),
            ParamValue::Object(_) => None,
        });
        ParameterKey::cacheable(texts, NON_CACHEABLE_PARAMETERS)
    }
}
